use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS user_profiles (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            role        TEXT NOT NULL DEFAULT 'member',
            avatar_url  TEXT,
            tier        TEXT NOT NULL DEFAULT 'free',
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS channels (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            domain      TEXT NOT NULL,
            created_by  TEXT NOT NULL REFERENCES user_profiles(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_channels_domain
            ON channels(domain);

        CREATE TABLE IF NOT EXISTS channel_messages (
            id          TEXT PRIMARY KEY,
            channel_id  TEXT NOT NULL REFERENCES channels(id),
            author_id   TEXT NOT NULL REFERENCES user_profiles(id),
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_channel
            ON channel_messages(channel_id, created_at);

        CREATE TABLE IF NOT EXISTS projects (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            domain      TEXT NOT NULL,
            created_by  TEXT NOT NULL REFERENCES user_profiles(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS project_members (
            project_id  TEXT NOT NULL REFERENCES projects(id),
            user_id     TEXT NOT NULL REFERENCES user_profiles(id),
            role        TEXT NOT NULL DEFAULT 'member',
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (project_id, user_id)
        );

        -- provider_subscription_id is UNIQUE: this is the idempotency key
        -- that makes at-least-once webhook delivery safe.
        CREATE TABLE IF NOT EXISTS subscriptions (
            id                        TEXT PRIMARY KEY,
            user_id                   TEXT NOT NULL REFERENCES user_profiles(id),
            status                    TEXT NOT NULL DEFAULT 'active',
            provider_customer_id      TEXT,
            provider_subscription_id  TEXT NOT NULL UNIQUE,
            created_at                TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_subscriptions_user
            ON subscriptions(user_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
