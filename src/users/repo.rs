use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo_types::{NewUser, Registration, UserRecord, UserRow};
use crate::{auth::claims::Role, store::UpdateSummary};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Exact match on the unique email key.
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>>;
    async fn register(&self, user: NewUser) -> anyhow::Result<Registration>;
    async fn list(&self) -> anyhow::Result<Vec<UserRecord>>;
    /// Case-insensitive substring match on name or email.
    async fn search(&self, text: &str) -> anyhow::Result<Vec<UserRecord>>;
    async fn set_role(&self, id: Uuid, role: Role) -> anyhow::Result<UpdateSummary>;
}

/// Escapes LIKE metacharacters so user input only ever matches literally.
pub(crate) fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn into_records(rows: Vec<UserRow>) -> anyhow::Result<Vec<UserRecord>> {
    rows.into_iter().map(UserRecord::try_from).collect()
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, name, role, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        row.map(UserRecord::try_from).transpose()
    }

    async fn register(&self, user: NewUser) -> anyhow::Result<Registration> {
        let inserted = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (email, name, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO NOTHING
            RETURNING id, email, name, role, created_at, updated_at
            "#,
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.role.as_str())
        .fetch_optional(&self.db)
        .await
        .context("insert user")?;

        if let Some(row) = inserted {
            return Ok(Registration::Created(row.try_into()?));
        }
        let existing = self
            .find_by_email(&user.email)
            .await?
            .context("user vanished after email conflict")?;
        Ok(Registration::Existing(existing))
    }

    async fn list(&self) -> anyhow::Result<Vec<UserRecord>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, name, role, created_at, updated_at
            FROM users
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("list users")?;
        into_records(rows)
    }

    async fn search(&self, text: &str) -> anyhow::Result<Vec<UserRecord>> {
        let pattern = format!("%{}%", escape_like(text));
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, name, role, created_at, updated_at
            FROM users
            WHERE name ILIKE $1 OR email ILIKE $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(pattern)
        .fetch_all(&self.db)
        .await
        .context("search users")?;
        into_records(rows)
    }

    async fn set_role(&self, id: Uuid, role: Role) -> anyhow::Result<UpdateSummary> {
        let (matched, modified) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            WITH target AS (
                SELECT id, role = $2 AS unchanged
                  FROM users
                 WHERE id = $1
                   FOR UPDATE
            ), changed AS (
                UPDATE users u
                   SET role = $2, updated_at = now()
                  FROM target t
                 WHERE u.id = t.id AND NOT t.unchanged
                RETURNING u.id
            )
            SELECT (SELECT count(*) FROM target), (SELECT count(*) FROM changed)
            "#,
        )
        .bind(id)
        .bind(role.as_str())
        .fetch_one(&self.db)
        .await
        .context("set user role")?;
        Ok(UpdateSummary {
            matched_count: matched as u64,
            modified_count: modified as u64,
        })
    }
}

/// In-process user store, used by tests.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<UserRecord>>,
}

impl MemoryUserStore {
    /// Inserts or overwrites a record directly, bypassing registration rules.
    pub async fn put(&self, email: &str, role: Role) -> UserRecord {
        let now = OffsetDateTime::now_utc();
        let record = UserRecord {
            id: Uuid::new_v4(),
            name: None,
            email: email.to_string(),
            role,
            created_at: now,
            updated_at: now,
        };
        let mut users = self.users.write().await;
        users.retain(|u| u.email != email);
        users.push(record.clone());
        record
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn register(&self, user: NewUser) -> anyhow::Result<Registration> {
        let mut users = self.users.write().await;
        if let Some(existing) = users.iter().find(|u| u.email == user.email) {
            return Ok(Registration::Existing(existing.clone()));
        }
        let now = OffsetDateTime::now_utc();
        let record = UserRecord {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        users.push(record.clone());
        Ok(Registration::Created(record))
    }

    async fn list(&self) -> anyhow::Result<Vec<UserRecord>> {
        Ok(self.users.read().await.clone())
    }

    async fn search(&self, text: &str) -> anyhow::Result<Vec<UserRecord>> {
        let needle = text.to_lowercase();
        Ok(self
            .users
            .read()
            .await
            .iter()
            .filter(|u| {
                u.email.to_lowercase().contains(&needle)
                    || u
                        .name
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect())
    }

    async fn set_role(&self, id: Uuid, role: Role) -> anyhow::Result<UpdateSummary> {
        let mut users = self.users.write().await;
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(UpdateSummary::default());
        };
        let modified = user.role != role;
        if modified {
            user.role = role;
            user.updated_at = OffsetDateTime::now_utc();
        }
        Ok(UpdateSummary {
            matched_count: 1,
            modified_count: modified as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str, name: &str) -> NewUser {
        NewUser {
            email: email.into(),
            name: Some(name.into()),
            role: Role::Student,
        }
    }

    #[test]
    fn escape_like_neutralizes_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[tokio::test]
    async fn second_registration_returns_existing_record() {
        let store = MemoryUserStore::default();
        let Registration::Created(first) = store.register(new_user("a@x.com", "Ann")).await.unwrap()
        else {
            panic!("first registration should create");
        };
        let mut again = new_user("a@x.com", "Someone Else");
        again.role = Role::Teacher;
        match store.register(again).await.unwrap() {
            Registration::Existing(existing) => {
                assert_eq!(existing, first);
                assert_eq!(existing.role, Role::Student);
            }
            Registration::Created(_) => panic!("duplicate email must not create"),
        }
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn search_is_case_insensitive_on_name_and_email() {
        let store = MemoryUserStore::default();
        store.register(new_user("ann@x.com", "Ann Smith")).await.unwrap();
        store.register(new_user("bob@y.org", "Bob")).await.unwrap();

        let by_name = store.search("SMITH").await.unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].email, "ann@x.com");

        let by_email = store.search("Y.ORG").await.unwrap();
        assert_eq!(by_email.len(), 1);
        assert_eq!(by_email[0].email, "bob@y.org");

        assert!(store.search("carol").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_role_counts_real_changes_only() {
        let store = MemoryUserStore::default();
        let user = store.put("t@x.com", Role::Student).await;

        let changed = store.set_role(user.id, Role::Teacher).await.unwrap();
        assert_eq!(changed, UpdateSummary { matched_count: 1, modified_count: 1 });
        let same = store.set_role(user.id, Role::Teacher).await.unwrap();
        assert_eq!(same, UpdateSummary { matched_count: 1, modified_count: 0 });
        let missing = store.set_role(Uuid::new_v4(), Role::Admin).await.unwrap();
        assert_eq!(missing, UpdateSummary::default());

        let stored = store.find_by_email("t@x.com").await.unwrap().unwrap();
        assert_eq!(stored.role, Role::Teacher);
    }
}
