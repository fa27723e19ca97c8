// src/identity.rs
//! Who is signed in, and what they are called

use crate::{
    error::{Result, TrackerError},
    recorder::RunRecord,
};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

/// Authentication collaborator as seen by the run recorder
#[async_trait]
pub trait Identity: Send + Sync {
    /// Identifier of the signed-in user, if any
    fn current_user_id(&self) -> Option<String>;

    /// Display name for a user id
    async fn current_username(&self, user_id: &str) -> Result<String>;
}

/// Fixed identity, e.g. taken from the configuration file
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user: Option<(String, String)>,
}

impl StaticIdentity {
    pub fn signed_in(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user: Some((user_id.into(), username.into())),
        }
    }

    pub fn signed_out() -> Self {
        Self { user: None }
    }
}

#[async_trait]
impl Identity for StaticIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.user.as_ref().map(|(id, _)| id.clone())
    }

    async fn current_username(&self, user_id: &str) -> Result<String> {
        match &self.user {
            Some((id, name)) if id == user_id => Ok(name.clone()),
            _ => Err(TrackerError::Other(format!("No username known for {}", user_id))),
        }
    }
}

/// User id to username map, the equivalent of a `/usernames` table
#[derive(Debug, Default)]
pub struct UsernameDirectory {
    names: RwLock<HashMap<String, String>>,
}

impl UsernameDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from stored runs; a user's most recent record wins
    pub fn from_runs<'a>(runs: impl IntoIterator<Item = &'a RunRecord>) -> Self {
        let directory = Self::new();
        let mut names = directory.names.write().unwrap_or_else(PoisonError::into_inner);
        let mut newest = HashMap::new();
        for run in runs {
            let newer = newest.get(&run.user_id).map_or(true, |date| run.date >= *date);
            if newer && !run.username.is_empty() {
                newest.insert(run.user_id.clone(), run.date);
                names.insert(run.user_id.clone(), run.username.clone());
            }
        }
        drop(names);
        directory
    }

    pub fn register(&self, user_id: impl Into<String>, username: impl Into<String>) {
        self.names
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.into(), username.into());
    }

    pub fn lookup(&self, user_id: &str) -> Option<String> {
        self.names
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
    }
}

/// Signed-in user whose name is resolved through a shared directory
#[derive(Debug, Clone)]
pub struct DirectoryIdentity {
    user_id: Arc<RwLock<Option<String>>>,
    directory: Arc<UsernameDirectory>,
}

impl DirectoryIdentity {
    pub fn new(directory: Arc<UsernameDirectory>) -> Self {
        Self {
            user_id: Arc::new(RwLock::new(None)),
            directory,
        }
    }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        *self.user_id.write().unwrap_or_else(PoisonError::into_inner) = Some(user_id.into());
    }

    pub fn sign_out(&self) {
        *self.user_id.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[async_trait]
impl Identity for DirectoryIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    async fn current_username(&self, user_id: &str) -> Result<String> {
        self.directory
            .lookup(user_id)
            .ok_or_else(|| TrackerError::Other(format!("No username registered for {}", user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_identity() {
        let identity = StaticIdentity::signed_in("u1", "alice");
        assert_eq!(identity.current_user_id().as_deref(), Some("u1"));
        assert_eq!(identity.current_username("u1").await.unwrap(), "alice");
        assert!(identity.current_username("u2").await.is_err());

        assert!(StaticIdentity::signed_out().current_user_id().is_none());
    }

    fn run(user: &str, name: &str, days_ago: i64) -> RunRecord {
        RunRecord {
            user_id: user.to_string(),
            username: name.to_string(),
            date: chrono::Utc::now() - chrono::Duration::days(days_ago),
            distance_km: 1.0,
            duration: "6m 0s".to_string(),
            elapsed_seconds: 360,
            average_speed_kmh: 10.0,
        }
    }

    #[test]
    fn test_directory_from_runs_keeps_newest_name() {
        let runs = vec![
            run("u1", "alice", 1),
            run("u1", "old-alice", 5),
            run("u2", "bob", 3),
        ];

        let directory = UsernameDirectory::from_runs(&runs);
        assert_eq!(directory.lookup("u1").as_deref(), Some("alice"));
        assert_eq!(directory.lookup("u2").as_deref(), Some("bob"));
        assert!(directory.lookup("u3").is_none());

        directory.register("u2", "robert");
        assert_eq!(directory.lookup("u2").as_deref(), Some("robert"));
    }

    #[tokio::test]
    async fn test_directory_identity() {
        let directory = Arc::new(UsernameDirectory::new());
        directory.register("u1", "alice");

        let identity = DirectoryIdentity::new(Arc::clone(&directory));
        assert!(identity.current_user_id().is_none());

        identity.sign_in("u1");
        assert_eq!(identity.current_username("u1").await.unwrap(), "alice");

        identity.sign_out();
        assert!(identity.current_user_id().is_none());
    }
}
