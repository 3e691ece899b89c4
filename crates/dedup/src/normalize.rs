use std::collections::HashMap;

use crate::model::Person;

/// Collapse every whitespace run to one space, trim, lowercase.
fn squash(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Grouping key for a person's name. Never persisted or displayed.
pub fn normalize_name(first: Option<&str>, last: Option<&str>) -> String {
    let joined = format!(
        "{} {}",
        squash(first.unwrap_or("")),
        squash(last.unwrap_or(""))
    );
    squash(&joined)
}

pub fn person_key(person: &Person) -> String {
    normalize_name(person.first_name.as_deref(), person.last_name.as_deref())
}

/// Single forward pass: normalized name -> members, groups kept in
/// first-seen order and members in input order.
pub fn group_by_name(persons: Vec<Person>) -> Vec<(String, Vec<Person>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<Person>)> = Vec::new();

    for person in persons {
        let key = person_key(&person);
        match index.get(&key) {
            Some(&i) => groups[i].1.push(person),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![person]));
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PersonId;

    fn person(id: &str, first: &str, last: &str) -> Person {
        Person {
            id: PersonId::from(id),
            first_name: Some(first.into()),
            last_name: Some(last.into()),
            phone: None,
            date_of_birth: None,
            created_at: None,
            deleted: false,
        }
    }

    #[test]
    fn trims_lowercases_and_collapses() {
        assert_eq!(normalize_name(Some("Jane"), Some("Doe")), "jane doe");
        assert_eq!(normalize_name(Some("jane"), Some(" doe ")), "jane doe");
        assert_eq!(normalize_name(Some("  Mary \t Ann "), Some("BANDA")), "mary ann banda");
    }

    #[test]
    fn missing_parts_are_empty() {
        assert_eq!(normalize_name(None, Some("Phiri")), "phiri");
        assert_eq!(normalize_name(Some("Grace"), None), "grace");
        assert_eq!(normalize_name(None, None), "");
    }

    #[test]
    fn split_across_fields_still_collides() {
        assert_eq!(
            normalize_name(Some("Mary Ann"), Some("Banda")),
            normalize_name(Some("Mary"), Some("Ann Banda"))
        );
    }

    #[test]
    fn groups_keep_first_seen_order() {
        let groups = group_by_name(vec![
            person("1", "Jane", "Doe"),
            person("2", "Moses", "Banda"),
            person("3", "JANE", "doe"),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "jane doe");
        let ids: Vec<_> = groups[0].1.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(groups[1].1.len(), 1);
    }
}
