use crate::models::{ChannelRow, MessageRow, ProfileRow, ProjectRow, SubscriptionRow};
use crate::Database;
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Profiles --

    pub fn create_profile(
        &self,
        id: &str,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_profiles (id, name, email, password) VALUES (?1, ?2, ?3, ?4)",
                (id, name, email, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_profile_by_email(&self, email: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| query_profile(conn, "email", email))
    }

    pub fn get_profile_by_id(&self, id: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| query_profile(conn, "id", id))
    }

    pub fn set_profile_tier(&self, user_id: &str, tier: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE user_profiles SET tier = ?1 WHERE id = ?2",
                (tier, user_id),
            )?;
            Ok(changed > 0)
        })
    }

    pub fn set_profile_avatar(&self, user_id: &str, avatar_url: Option<&str>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE user_profiles SET avatar_url = ?1 WHERE id = ?2",
                (avatar_url, user_id),
            )?;
            Ok(())
        })
    }

    // -- Channels --

    /// `created_at` is supplied by the caller so the stored row carries the
    /// exact timestamp already returned in the response.
    pub fn create_channel(
        &self,
        id: &str,
        name: &str,
        domain: &str,
        created_by: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO channels (id, name, domain, created_by, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, name, domain, created_by, created_at),
            )?;
            Ok(())
        })
    }

    /// Channels visible to a caller: those whose domain matches the caller's
    /// email domain. Absent rows read as an empty list.
    pub fn list_channels_for_domain(&self, domain: &str) -> Result<Vec<ChannelRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, domain, created_by, created_at
                 FROM channels WHERE domain = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt
                .query_map([domain], |row| {
                    Ok(ChannelRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        domain: row.get(2)?,
                        created_by: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_channel(&self, id: &str) -> Result<Option<ChannelRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, domain, created_by, created_at FROM channels WHERE id = ?1",
            )?;
            let row = stmt
                .query_row([id], |row| {
                    Ok(ChannelRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        domain: row.get(2)?,
                        created_by: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    // -- Messages --

    /// `created_at` is supplied by the caller so history later serves the
    /// same timestamp the live broadcast event carried.
    pub fn insert_message(
        &self,
        id: &str,
        channel_id: &str,
        author_id: &str,
        content: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO channel_messages (id, channel_id, author_id, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, channel_id, author_id, content, created_at),
            )?;
            Ok(())
        })
    }

    /// Full channel history, ascending by creation time with rowid breaking
    /// ties (insertion order at the store). Author name/avatar are joined in
    /// a single query to avoid an N+1 lookup per message.
    pub fn get_channel_messages(&self, channel_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_messages(conn, channel_id))
    }

    // -- Projects --

    pub fn create_project(
        &self,
        id: &str,
        name: &str,
        domain: &str,
        created_by: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO projects (id, name, domain, created_by) VALUES (?1, ?2, ?3, ?4)",
                (id, name, domain, created_by),
            )?;
            conn.execute(
                "INSERT INTO project_members (project_id, user_id, role) VALUES (?1, ?2, 'admin')",
                (id, created_by),
            )?;
            Ok(())
        })
    }

    pub fn add_project_member(&self, project_id: &str, user_id: &str, role: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO project_members (project_id, user_id, role) VALUES (?1, ?2, ?3)",
                (project_id, user_id, role),
            )?;
            Ok(())
        })
    }

    pub fn list_projects_for_user(&self, user_id: &str) -> Result<Vec<ProjectRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.name, p.domain, pm.role, p.created_at
                 FROM projects p
                 JOIN project_members pm ON pm.project_id = p.id
                 WHERE pm.user_id = ?1
                 ORDER BY p.created_at ASC, p.rowid ASC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(ProjectRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        domain: row.get(2)?,
                        role: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Subscriptions --

    /// Record a subscription created by the billing webhook. Keyed on the
    /// provider subscription id so a redelivered webhook inserts nothing.
    /// Returns true if a row was actually inserted.
    pub fn insert_subscription(
        &self,
        id: &str,
        user_id: &str,
        provider_customer_id: Option<&str>,
        provider_subscription_id: &str,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO subscriptions
                     (id, user_id, provider_customer_id, provider_subscription_id)
                 VALUES (?1, ?2, ?3, ?4)",
                (id, user_id, provider_customer_id, provider_subscription_id),
            )?;
            Ok(inserted > 0)
        })
    }

    /// Mark a subscription canceled. Returns the owning user id so the
    /// caller can downgrade the profile tier.
    pub fn cancel_subscription(&self, provider_subscription_id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let user_id: Option<String> = conn
                .query_row(
                    "SELECT user_id FROM subscriptions WHERE provider_subscription_id = ?1",
                    [provider_subscription_id],
                    |row| row.get(0),
                )
                .optional()?;

            if user_id.is_some() {
                conn.execute(
                    "UPDATE subscriptions SET status = 'canceled' WHERE provider_subscription_id = ?1",
                    [provider_subscription_id],
                )?;
            }
            Ok(user_id)
        })
    }

    pub fn list_subscriptions_for_user(&self, user_id: &str) -> Result<Vec<SubscriptionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, status, provider_customer_id, provider_subscription_id, created_at
                 FROM subscriptions WHERE user_id = ?1 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(SubscriptionRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        status: row.get(2)?,
                        provider_customer_id: row.get(3)?,
                        provider_subscription_id: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_profile(conn: &Connection, column: &str, value: &str) -> Result<Option<ProfileRow>> {
    // `column` is one of two literals from this module, never user input.
    let sql = format!(
        "SELECT id, name, email, password, role, avatar_url, tier, created_at
         FROM user_profiles WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(ProfileRow {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                role: row.get(4)?,
                avatar_url: row.get(5)?,
                tier: row.get(6)?,
                created_at: row.get(7)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_messages(conn: &Connection, channel_id: &str) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT m.id, m.channel_id, m.author_id, u.name, u.avatar_url, m.content, m.created_at
         FROM channel_messages m
         LEFT JOIN user_profiles u ON m.author_id = u.id
         WHERE m.channel_id = ?1
         ORDER BY m.created_at ASC, m.rowid ASC",
    )?;

    let rows = stmt
        .query_map([channel_id], |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                channel_id: row.get(1)?,
                author_id: row.get(2)?,
                author_name: row
                    .get::<_, Option<String>>(3)?
                    .unwrap_or_else(|| "unknown".to_string()),
                author_avatar_url: row.get(4)?,
                content: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
