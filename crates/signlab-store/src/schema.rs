//! Table definitions. Every user-owned row cascades on user deletion.

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY,
    email         TEXT UNIQUE NOT NULL,
    password_hash TEXT NOT NULL,
    name          TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    last_login    TEXT,
    is_active     INTEGER NOT NULL DEFAULT 1,
    profile_data  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS user_sessions (
    id            TEXT PRIMARY KEY,
    user_id       TEXT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    device_info   TEXT,
    ip_address    TEXT,
    session_start TEXT NOT NULL,
    session_end   TEXT,
    is_active     INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS user_progress (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id        TEXT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    language       TEXT NOT NULL,
    signs_learned  INTEGER NOT NULL DEFAULT 0,
    accuracy_score REAL NOT NULL DEFAULT 0.0,
    practice_time  INTEGER NOT NULL DEFAULT 0,
    level          TEXT NOT NULL DEFAULT 'Beginner',
    last_updated   TEXT NOT NULL,
    UNIQUE (user_id, language)
);

CREATE TABLE IF NOT EXISTS activity_logs (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id       TEXT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    session_id    TEXT,
    activity_type TEXT NOT NULL,
    activity_data TEXT,
    timestamp     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS practice_sessions (
    id                 TEXT PRIMARY KEY,
    user_id            TEXT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    language           TEXT NOT NULL,
    session_type       TEXT NOT NULL,
    start_time         TEXT NOT NULL,
    end_time           TEXT,
    signs_practiced    INTEGER NOT NULL DEFAULT 0,
    correct_signs      INTEGER NOT NULL DEFAULT 0,
    total_attempts     INTEGER NOT NULL DEFAULT 0,
    average_confidence REAL NOT NULL DEFAULT 0.0,
    session_data       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS quiz_results (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id         TEXT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    language        TEXT NOT NULL,
    quiz_id         TEXT NOT NULL,
    score           INTEGER NOT NULL,
    total_questions INTEGER NOT NULL,
    time_taken      INTEGER,
    completed_at    TEXT NOT NULL,
    answers         TEXT
);

CREATE TABLE IF NOT EXISTS daily_challenges (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id        TEXT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    challenge_id   TEXT NOT NULL,
    language       TEXT NOT NULL,
    completed      INTEGER NOT NULL DEFAULT 0,
    daily          INTEGER NOT NULL DEFAULT 0,
    score          INTEGER NOT NULL DEFAULT 0,
    completed_at   TEXT,
    challenge_date TEXT NOT NULL,
    result_data    TEXT
);

CREATE TABLE IF NOT EXISTS sign_attempts (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id        TEXT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    session_id     TEXT NOT NULL,
    language       TEXT NOT NULL,
    target_sign    TEXT NOT NULL,
    predicted_sign TEXT,
    confidence     REAL,
    is_correct     INTEGER NOT NULL,
    attempt_time   TEXT NOT NULL,
    feedback       TEXT
);

CREATE INDEX IF NOT EXISTS idx_activity_user ON activity_logs (user_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_attempts_user ON sign_attempts (user_id, language);
CREATE INDEX IF NOT EXISTS idx_challenges_user ON daily_challenges (user_id, challenge_date);
CREATE UNIQUE INDEX IF NOT EXISTS idx_daily_once ON daily_challenges (user_id, challenge_date) WHERE daily = 1;
";
