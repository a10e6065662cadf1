use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY,
            uuid        TEXT NOT NULL UNIQUE,
            nickname    TEXT NOT NULL,
            email       TEXT NOT NULL UNIQUE,
            admin_role  TEXT NOT NULL DEFAULT 'USER',
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS requests (
            id               INTEGER PRIMARY KEY,
            uuid             TEXT NOT NULL UNIQUE,
            title            TEXT NOT NULL,
            description      TEXT,
            size             TEXT NOT NULL,
            status           TEXT NOT NULL DEFAULT 'OPEN',
            visibility       TEXT NOT NULL DEFAULT 'ALL',
            kilograms        REAL,
            url              TEXT,
            needed_before    TEXT,
            completed_on     TEXT,
            created_by       INTEGER NOT NULL REFERENCES users(id),
            provider_id      INTEGER REFERENCES users(id),
            receiver_id      INTEGER REFERENCES users(id),
            organization_id  INTEGER NOT NULL,
            dest_description TEXT NOT NULL,
            dest_country     TEXT,
            dest_lat         REAL,
            dest_lon         REAL,
            orig_description TEXT,
            orig_country     TEXT,
            orig_lat         REAL,
            orig_lon         REAL,
            meeting_id       INTEGER,
            created_at       TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at       TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_requests_status
            ON requests(status);

        -- Append-only audit log; ordered by rowid within a request.
        CREATE TABLE IF NOT EXISTS request_histories (
            id          INTEGER PRIMARY KEY,
            request_id  INTEGER NOT NULL REFERENCES requests(id),
            status      TEXT NOT NULL,
            receiver_id INTEGER,
            provider_id INTEGER,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_request_histories_request
            ON request_histories(request_id, id);

        CREATE TABLE IF NOT EXISTS potential_providers (
            id              INTEGER PRIMARY KEY,
            request_id      INTEGER NOT NULL REFERENCES requests(id),
            user_id         INTEGER NOT NULL REFERENCES users(id),
            delivery_after  TEXT NOT NULL,
            delivery_before TEXT NOT NULL,
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(request_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_potential_providers_request
            ON potential_providers(request_id);

        CREATE TABLE IF NOT EXISTS watches (
            id               INTEGER PRIMARY KEY,
            uuid             TEXT NOT NULL UNIQUE,
            owner_id         INTEGER NOT NULL REFERENCES users(id),
            name             TEXT NOT NULL,
            dest_description TEXT,
            dest_country     TEXT,
            dest_lat         REAL,
            dest_lon         REAL,
            orig_description TEXT,
            orig_country     TEXT,
            orig_lat         REAL,
            orig_lon         REAL,
            meeting_id       INTEGER,
            search_text      TEXT,
            size             TEXT,
            created_at       TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at       TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_watches_owner
            ON watches(owner_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
