use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::db::{Participant, ParticipantKind};

/// Optional case-insensitive substring filter on display names.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchFilter {
    #[serde(default, rename = "search")]
    pub text: Option<String>,
}

impl SearchFilter {
    pub fn new(text: impl Into<String>) -> Self {
        SearchFilter { text: Some(text.into()) }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self.text.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(needle) => name.to_lowercase().contains(&needle.to_lowercase()),
        }
    }
}

/// Student and tutor identities. Chat only ever reads from here.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn search(
        &self,
        kind: ParticipantKind,
        filter: &SearchFilter,
        excluding: &str,
    ) -> anyhow::Result<Vec<Participant>>;

    async fn find_by_id(&self, kind: ParticipantKind, id: &str) -> anyhow::Result<Option<Participant>>;

    /// Looks the id up as a student first, then as a tutor.
    async fn resolve(&self, id: &str) -> anyhow::Result<Option<Participant>> {
        for kind in [ParticipantKind::Student, ParticipantKind::Tutor] {
            if let Some(found) = self.find_by_id(kind, id).await? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    async fn is_blocked(&self, kind: ParticipantKind, id: &str) -> anyhow::Result<bool> {
        Ok(self
            .find_by_id(kind, id)
            .await?
            .is_some_and(|p| p.is_blocked))
    }
}

#[derive(Clone)]
pub struct SqliteDirectory {
    db_pool: SqlitePool,
}

impl SqliteDirectory {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl IdentityDirectory for SqliteDirectory {
    async fn search(
        &self,
        kind: ParticipantKind,
        filter: &SearchFilter,
        excluding: &str,
    ) -> anyhow::Result<Vec<Participant>> {
        let sql = format!(
            "SELECT id,name,email,profile_picture,is_blocked FROM {} WHERE id<>? AND is_blocked=0 ORDER BY name",
            kind.table()
        );
        let rows: Vec<Participant> = sqlx::query_as(&sql)
            .bind(excluding)
            .fetch_all(&self.db_pool)
            .await
            .with_context(|| format!("searching {}", kind.table()))?;

        Ok(rows
            .into_iter()
            .filter(|p| filter.matches(&p.display_name))
            .map(|p| Participant { kind: Some(kind), ..p })
            .collect())
    }

    async fn find_by_id(&self, kind: ParticipantKind, id: &str) -> anyhow::Result<Option<Participant>> {
        let sql = format!(
            "SELECT id,name,email,profile_picture,is_blocked FROM {} WHERE id=?",
            kind.table()
        );
        let row: Option<Participant> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await
            .with_context(|| format!("loading {} {id}", kind.as_str()))?;

        Ok(row.map(|p| Participant { kind: Some(kind), ..p }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_matches_everything() {
        assert!(SearchFilter::default().matches("Ada Lovelace"));
        assert!(SearchFilter::new("  ").matches("Ada Lovelace"));
    }

    #[test]
    fn filter_is_case_insensitive_substring() {
        let filter = SearchFilter::new("LOVE");
        assert!(filter.matches("Ada Lovelace"));
        assert!(!filter.matches("Grace Hopper"));
        assert!(SearchFilter::new("élo").matches("MÉLODIE"));
    }
}
