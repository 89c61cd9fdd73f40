use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::Result;
use rand::{distr::Alphanumeric, Rng};
use rusqlite::Connection;

use crate::model::User;
use crate::store::{groups, messages, users};
use crate::ttl::TtlMap;

/// Live one-time link secrets. `by_secret` is the redemption index; `pending`
/// is the reverse presence marker keyed by requester id, inserted with the
/// same TTL in the same call so the pair expires together.
pub struct SecretStore {
    by_secret: TtlMap<String, i64>,
    pending: TtlMap<i64, ()>,
    secret_len: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub enum IssueOutcome {
    Issued(String),
    AlreadyPending,
}

impl SecretStore {
    pub fn new(ttl: Duration, secret_len: usize) -> Self {
        Self {
            by_secret: TtlMap::new(ttl),
            pending: TtlMap::new(ttl),
            secret_len,
        }
    }

    /// Bulk-evicts expired secrets, clearing the presence marker of every
    /// evicted requester in lockstep.
    pub fn sweep(&mut self, max_items: usize) {
        for requester_id in self.by_secret.sweep(max_items) {
            self.pending.remove(&requester_id);
        }
        self.pending.sweep(max_items);
    }

    /// Issues a fresh secret for the user, or reports the one already
    /// pending (idempotent; the live secret is not reissued).
    pub fn issue(&mut self, user_id: i64) -> IssueOutcome {
        if self.pending.get(&user_id).is_some() {
            return IssueOutcome::AlreadyPending;
        }
        let secret = loop {
            let candidate: String = rand::rng()
                .sample_iter(Alphanumeric)
                .take(self.secret_len)
                .map(char::from)
                .collect();
            // collision odds are negligible at 48 alphanumeric chars, but a
            // duplicate would silently revoke someone else's secret
            if self.by_secret.get(&candidate).is_none() {
                break candidate;
            }
        };
        self.by_secret.insert(secret.clone(), user_id);
        self.pending.insert(user_id, ());
        IssueOutcome::Issued(secret)
    }

    /// The requester behind a live secret, if any. Does not consume it.
    pub fn requester(&mut self, secret: &str) -> Option<i64> {
        self.by_secret.get(secret).copied()
    }

    /// Exactly-once consumption: removes the secret and its presence marker.
    pub fn consume(&mut self, secret: &str) {
        if let Some(requester_id) = self.by_secret.remove(secret) {
            self.pending.remove(&requester_id);
        }
    }
}

/// Moves every member of the requester's group into the redeemer's group,
/// unions the chat sets into the surviving group and deletes the emptied
/// one. Runs inside the caller's transaction.
pub fn merge_groups(conn: &Connection, requester: &User, redeemer: &User) -> Result<()> {
    let absorbed = groups::by_id(conn, requester.group_id)?;
    let mut surviving = groups::by_id(conn, redeemer.group_id)?;

    for member in users::in_group(conn, requester.group_id)? {
        users::assign_group(conn, member.id, surviving.id)?;
    }
    for chat_id in absorbed.chats {
        surviving.add_chat(chat_id);
    }
    groups::set_chats(conn, surviving.id, &surviving.chats)?;
    groups::delete(conn, absorbed.id)
}

fn authored_union(conn: &Connection, members: &[User]) -> Result<Vec<i64>> {
    let mut chats = BTreeSet::new();
    for member in members {
        chats.extend(messages::authored_chat_ids(conn, member.id)?);
    }
    Ok(chats.into_iter().collect())
}

/// Splits the caller out: every other member of the caller's group moves to
/// a new group. Both resulting chat sets are recomputed from the members'
/// own message history rather than copied from the old union, so a departing
/// member keeps only the visibility it individually earned. A side that ends
/// up with no members gets no group at all.
pub fn split_group(conn: &Connection, caller: &User) -> Result<()> {
    let members = users::in_group(conn, caller.group_id)?;
    let (staying, leaving): (Vec<User>, Vec<User>) =
        members.into_iter().partition(|m| m.id == caller.id);

    if leaving.is_empty() {
        return Ok(());
    }

    let new_group = groups::create(conn, &authored_union(conn, &leaving)?)?;
    for member in &leaving {
        users::assign_group(conn, member.id, new_group.id)?;
    }
    groups::set_chats(conn, caller.group_id, &authored_union(conn, &staying)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Platform;
    use crate::store::{chats, Store};
    use chrono::Utc;

    const TTL: Duration = Duration::from_millis(60);
    const SECRET_LEN: usize = 48;

    fn secret_store() -> SecretStore {
        SecretStore::new(TTL, SECRET_LEN)
    }

    #[test]
    fn issue_is_idempotent_while_pending() {
        let mut secrets = secret_store();
        let secret = match secrets.issue(1) {
            IssueOutcome::Issued(s) => s,
            other => panic!("expected a fresh secret, got {other:?}"),
        };
        assert_eq!(secret.len(), SECRET_LEN);

        assert_eq!(secrets.issue(1), IssueOutcome::AlreadyPending);
        // the original secret is untouched
        assert_eq!(secrets.requester(&secret), Some(1));
    }

    #[test]
    fn consume_is_exactly_once() {
        let mut secrets = secret_store();
        let secret = match secrets.issue(1) {
            IssueOutcome::Issued(s) => s,
            other => panic!("unexpected {other:?}"),
        };

        assert_eq!(secrets.requester(&secret), Some(1));
        secrets.consume(&secret);
        assert_eq!(secrets.requester(&secret), None);
        // presence cleared: a new secret can be issued immediately
        assert!(matches!(secrets.issue(1), IssueOutcome::Issued(_)));
    }

    #[test]
    fn expired_secret_is_unusable_and_unblocks_reissue() {
        let mut secrets = secret_store();
        let secret = match secrets.issue(1) {
            IssueOutcome::Issued(s) => s,
            other => panic!("unexpected {other:?}"),
        };

        std::thread::sleep(TTL + Duration::from_millis(40));
        secrets.sweep(256);
        assert_eq!(secrets.requester(&secret), None);
        assert!(matches!(secrets.issue(1), IssueOutcome::Issued(_)));
    }

    #[tokio::test]
    async fn merge_unions_chats_and_drops_the_empty_group() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.lock().await;

        let a = users::get_or_create(&conn, Platform::Telegram, 1).unwrap();
        let b = users::get_or_create(&conn, Platform::Discord, 2).unwrap();
        groups::set_chats(&conn, a.group_id, &[1, 3]).unwrap();
        groups::set_chats(&conn, b.group_id, &[2, 3]).unwrap();

        merge_groups(&conn, &a, &b).unwrap();

        let a = users::by_id(&conn, a.id).unwrap();
        let b = users::by_id(&conn, b.id).unwrap();
        assert_eq!(a.group_id, b.group_id);
        assert_eq!(groups::by_id(&conn, b.group_id).unwrap().chats, vec![1, 2, 3]);
        assert_eq!(users::in_group(&conn, b.group_id).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn split_recomputes_each_sides_earned_chats() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.lock().await;

        let a = users::get_or_create(&conn, Platform::Telegram, 1).unwrap();
        let b = users::get_or_create(&conn, Platform::Discord, 2).unwrap();
        let chat_a = chats::get_or_create(&conn, Platform::Telegram, 10, "a").unwrap();
        let chat_b = chats::get_or_create(&conn, Platform::Discord, 20, "b").unwrap();

        let now = Utc::now();
        messages::insert(&conn, "from a", now, a.id, chat_a.id).unwrap();
        messages::insert(&conn, "from b", now, b.id, chat_b.id).unwrap();
        groups::add_chat(&conn, a.group_id, chat_a.id).unwrap();
        groups::add_chat(&conn, b.group_id, chat_b.id).unwrap();

        merge_groups(&conn, &a, &b).unwrap();
        let merged = users::by_id(&conn, a.id).unwrap().group_id;
        assert_eq!(
            groups::by_id(&conn, merged).unwrap().chats,
            vec![chat_a.id, chat_b.id]
        );

        let b = users::by_id(&conn, b.id).unwrap();
        split_group(&conn, &b).unwrap();

        let a = users::by_id(&conn, a.id).unwrap();
        let b = users::by_id(&conn, b.id).unwrap();
        // back to two distinct singleton groups
        assert_ne!(a.group_id, b.group_id);
        assert_eq!(users::in_group(&conn, a.group_id).unwrap().len(), 1);
        assert_eq!(users::in_group(&conn, b.group_id).unwrap().len(), 1);
        // each side keeps only the chats it personally authored in
        assert_eq!(groups::by_id(&conn, a.group_id).unwrap().chats, vec![chat_a.id]);
        assert_eq!(groups::by_id(&conn, b.group_id).unwrap().chats, vec![chat_b.id]);
    }

    #[tokio::test]
    async fn split_of_a_singleton_group_is_a_noop() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.lock().await;

        let a = users::get_or_create(&conn, Platform::Telegram, 1).unwrap();
        split_group(&conn, &a).unwrap();
        assert_eq!(users::by_id(&conn, a.id).unwrap().group_id, a.group_id);
    }

    #[tokio::test]
    async fn split_preserves_the_member_partition() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.lock().await;

        let a = users::get_or_create(&conn, Platform::Telegram, 1).unwrap();
        let b = users::get_or_create(&conn, Platform::Discord, 2).unwrap();
        let c = users::get_or_create(&conn, Platform::Vk, 3).unwrap();
        merge_groups(&conn, &b, &a).unwrap();
        let a = users::by_id(&conn, a.id).unwrap();
        merge_groups(&conn, &c, &a).unwrap();

        let a = users::by_id(&conn, a.id).unwrap();
        split_group(&conn, &a).unwrap();

        let a = users::by_id(&conn, a.id).unwrap();
        let b = users::by_id(&conn, b.id).unwrap();
        let c = users::by_id(&conn, c.id).unwrap();
        // caller alone on one side, the other two together on the other
        assert_ne!(a.group_id, b.group_id);
        assert_eq!(b.group_id, c.group_id);
        assert_eq!(users::in_group(&conn, a.group_id).unwrap().len(), 1);
        assert_eq!(users::in_group(&conn, b.group_id).unwrap().len(), 2);
    }
}
