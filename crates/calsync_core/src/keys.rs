//! Lock key catalog.

use std::fmt;

/// A domain-qualified lock key.
///
/// Keys are plain strings in the store; this type only exists so the
/// catalog of key shapes lives in one place. Parts are escaped (`%` as
/// `%25`, `:` as `%3A`), so ids containing `:` cannot collide with other
/// part boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockKey(String);

impl LockKey {
    /// Key guarding edits of one event: `event:<user>:<event>`.
    pub fn event(user_id: &str, event_id: &str) -> Self {
        Self::custom("event", &[user_id, event_id])
    }

    /// Key guarding a full calendar sync pass: `calendar-sync:<user>`.
    pub fn calendar_sync(user_id: &str) -> Self {
        Self::custom("calendar-sync", &[user_id])
    }

    /// Key guarding a friend request between two users.
    ///
    /// The pair is unordered: `friend_request(a, b) == friend_request(b, a)`.
    pub fn friend_request(user_id: &str, friend_id: &str) -> Self {
        let (low, high) = if user_id <= friend_id {
            (user_id, friend_id)
        } else {
            (friend_id, user_id)
        };
        Self::custom("friend-request", &[low, high])
    }

    /// Key for an ad-hoc critical section: `<namespace>:<part>:<part>...`.
    pub fn custom(namespace: &str, parts: &[&str]) -> Self {
        let mut key = namespace.to_owned();
        for part in parts {
            key.push(':');
            escape_into(&mut key, part);
        }
        Self(key)
    }

    /// Returns the key as stored.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn escape_into(key: &mut String, part: &str) {
    for c in part.chars() {
        match c {
            '%' => key.push_str("%25"),
            ':' => key.push_str("%3A"),
            c => key.push(c),
        }
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LockKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<LockKey> for String {
    fn from(key: LockKey) -> Self {
        key.0
    }
}
