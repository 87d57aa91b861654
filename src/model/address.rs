//! Sender and recipient address normalization.

/// A normalized mailbox address.
///
/// # Examples
/// - `"Jane Doe <jane@x.com>"` → `name = Some("Jane Doe")`, `address = "jane@x.com"`
/// - `"jane@x.com"` → `name = None`, `address = "jane@x.com"`
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Address {
    /// Display name, only present when the raw line carried an angle-bracketed address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The bare address (`user@domain`).
    pub address: String,
}

impl Address {
    /// Normalize a single raw address line.
    ///
    /// A line containing `<` is split into the text before `" <"` (the name)
    /// and the text between `<` and `>` (the address). Any other line is
    /// taken verbatim as the address.
    pub fn parse(raw: &str) -> Self {
        let line = raw.trim();

        if let Some(angle) = line.find('<') {
            let (name_part, rest) = match line.find(" <") {
                Some(pos) => (&line[..pos], &line[pos + 2..]),
                None => (&line[..angle], &line[angle + 1..]),
            };
            let address = rest.split('>').next().unwrap_or_default().trim().to_string();
            let name = strip_quotes(name_part);
            return Self {
                name: (!name.is_empty()).then_some(name),
                address,
            };
        }

        Self {
            name: None,
            address: line.to_string(),
        }
    }

    /// Split a comma-separated header line and normalize each entry.
    ///
    /// Handles quoted commas: `"Last, First" <a@b.com>, other@c.com`
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut results = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_angle = false;

        for ch in raw.chars() {
            match ch {
                '"' => {
                    in_quotes = !in_quotes;
                    current.push(ch);
                }
                '<' if !in_quotes => {
                    in_angle = true;
                    current.push(ch);
                }
                '>' if !in_quotes => {
                    in_angle = false;
                    current.push(ch);
                }
                ',' if !in_quotes && !in_angle => {
                    push_non_empty(&mut results, &current);
                    current.clear();
                }
                _ => current.push(ch),
            }
        }
        push_non_empty(&mut results, &current);

        results
    }
}

fn push_non_empty(results: &mut Vec<Address>, segment: &str) {
    let addr = Address::parse(segment);
    if !addr.address.is_empty() {
        results.push(addr);
    }
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_and_address() {
        let addr = Address::parse("Jane Doe <jane@x.com>");
        assert_eq!(addr.name.as_deref(), Some("Jane Doe"));
        assert_eq!(addr.address, "jane@x.com");
    }

    #[test]
    fn test_parse_bare_address_has_no_name() {
        let addr = Address::parse("jane@x.com");
        assert_eq!(addr.name, None);
        assert_eq!(addr.address, "jane@x.com");

        let json = serde_json::to_value(&addr).unwrap();
        assert!(json.get("name").is_none());
    }

    #[test]
    fn test_parse_angle_only() {
        let addr = Address::parse("<jane@x.com>");
        assert_eq!(addr.name, None);
        assert_eq!(addr.address, "jane@x.com");
    }

    #[test]
    fn test_parse_quoted_name() {
        let addr = Address::parse("\"Doe, Jane\" <jane@x.com>");
        assert_eq!(addr.name.as_deref(), Some("Doe, Jane"));
        assert_eq!(addr.address, "jane@x.com");
    }

    #[test]
    fn test_parse_list() {
        let list = Address::parse_list("User One <a@b.com>, \"Two, User\" <c@d.com>, plain@addr.com");
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].address, "a@b.com");
        assert_eq!(list[1].name.as_deref(), Some("Two, User"));
        assert_eq!(list[2], Address::parse("plain@addr.com"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Address::parse("Alice <a@x.com>").to_string(), "Alice <a@x.com>");
        assert_eq!(Address::parse("a@x.com").to_string(), "a@x.com");
    }
}
