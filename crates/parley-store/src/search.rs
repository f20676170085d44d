//! User search.
//!
//! Both sides are normalized (lowercased, non-alphanumerics stripped) and a
//! candidate matches when the query is a substring or a subsequence of its
//! name or email.

use crate::database::Database;
use crate::error::Result;
use crate::models::User;
use crate::views::UserView;

/// Lowercase and keep only ASCII letters and digits.
pub fn normalize(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// `true` when every char of `needle` appears in `haystack` in order.
pub fn is_subsequence(needle: &str, haystack: &str) -> bool {
    let mut wanted = needle.chars().peekable();
    for c in haystack.chars() {
        match wanted.peek() {
            Some(&w) if w == c => {
                wanted.next();
            }
            Some(_) => {}
            None => break,
        }
    }
    wanted.peek().is_none()
}

pub fn matches(query: &str, candidate: &str) -> bool {
    let needle = normalize(query);
    let haystack = normalize(candidate);
    haystack.contains(&needle) || is_subsequence(&needle, &haystack)
}

fn user_matches(query: &str, user: &User) -> bool {
    matches(query, &user.name) || matches(query, &user.email)
}

impl Database {
    /// Everyone except the caller whose name or email matches `query`
    /// (everyone when the query is blank), with live presence, by name.
    pub fn search_users(&self, caller: &User, query: Option<&str>) -> Result<Vec<UserView>> {
        let query = query.map(str::trim).filter(|q| !q.is_empty());

        let mut results = Vec::new();
        for user in self.list_users()? {
            if user.id == caller.id || user.subject == caller.subject {
                continue;
            }
            if let Some(query) = query {
                if !user_matches(query, &user) {
                    continue;
                }
            }
            results.push(self.user_view(&user)?);
        }

        results.sort_by(|left, right| {
            left.name
                .to_lowercase()
                .cmp(&right.name.to_lowercase())
                .then_with(|| left.name.cmp(&right.name))
        });
        Ok(results)
    }
}
