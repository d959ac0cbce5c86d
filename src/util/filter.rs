/// Allow/deny list over names. An empty allow list admits everything; the deny
/// list always wins. Patterns support `*` wildcards.
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl NameFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Self {
        Self {
            include: include.to_vec(),
            exclude: exclude.to_vec(),
        }
    }

    /// Check a single name, e.g. an organization login.
    pub fn allows(&self, name: &str) -> bool {
        self.allows_any(&[name])
    }

    /// Check an entity known by several names (a repository is matched by
    /// both `repo` and `org/repo`).
    pub fn allows_any(&self, names: &[&str]) -> bool {
        let matches =
            |patterns: &[String]| patterns.iter().any(|p| names.iter().any(|n| glob_match(p, n)));

        // If include patterns specified, name must match at least one
        if !self.include.is_empty() && !matches(&self.include) {
            return false;
        }

        // If exclude patterns specified, name must not match any
        !matches(&self.exclude)
    }
}

/// `*` matches any (possibly empty) sequence; everything else is literal.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    let (first, last) = match parts.as_slice() {
        [only] => return *only == text,
        [first, .., last] => (*first, *last),
        [] => return text.is_empty(),
    };

    if !text.starts_with(first) || !text.ends_with(last) {
        return false;
    }
    let mut pos = first.len();
    let end = text.len() - last.len();
    if end < pos {
        return false;
    }

    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match text[pos..end].find(part) {
            Some(idx) => pos += idx + part.len(),
            None => return false,
        }
    }

    true
}
