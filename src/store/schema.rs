pub const SCHEMA: &str = r#"
-- Accounts
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,         -- argon2id hash with embedded salt
    role TEXT NOT NULL DEFAULT 'user',   -- 'user' | 'admin'
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- One profile per user, created at registration
CREATE TABLE IF NOT EXISTS user_profiles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    country TEXT NOT NULL DEFAULT 'US',
    household_size INTEGER NOT NULL DEFAULT 1,
    profile_picture TEXT,
    baseline_calculated INTEGER NOT NULL DEFAULT 0,
    baseline_co2e REAL NOT NULL DEFAULT 0,
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Bearer sessions; the raw token is only ever shown to the client
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    token_hash TEXT NOT NULL,
    token_lookup TEXT NOT NULL,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT DEFAULT (datetime('now')),
    expires_at TEXT,            -- NULL = never
    last_used_at TEXT
);

-- Scenarios group activities; total_co2e is recomputed from activities
CREATE TABLE IF NOT EXISTS scenarios (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    total_co2e REAL NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,   -- soft delete flag
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS scenario_activities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    scenario_id INTEGER NOT NULL REFERENCES scenarios(id) ON DELETE CASCADE,
    category TEXT NOT NULL,
    activity_type TEXT NOT NULL,
    value REAL NOT NULL,
    unit TEXT NOT NULL,
    co2e_amount REAL NOT NULL DEFAULT 0,
    api_source TEXT NOT NULL DEFAULT 'default',
    created_at TEXT DEFAULT (datetime('now'))
);

-- Admin-maintained factors; the static catalog covers anything missing here
CREATE TABLE IF NOT EXISTS emission_factors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    category TEXT NOT NULL,
    activity_type TEXT NOT NULL,
    region TEXT NOT NULL DEFAULT 'global',
    co2e_per_unit REAL NOT NULL,
    unit TEXT NOT NULL,
    source TEXT,
    last_updated TEXT DEFAULT (datetime('now')),

    UNIQUE(category, activity_type, region)
);

CREATE TABLE IF NOT EXISTS user_xp (
    user_id INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
    xp_total INTEGER NOT NULL DEFAULT 0,
    last_updated TEXT DEFAULT (datetime('now'))
);

-- Social
CREATE TABLE IF NOT EXISTS social_likes (
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    milestone_user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (user_id, milestone_user_id)
);

CREATE TABLE IF NOT EXISTS social_tips (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    content TEXT NOT NULL,
    tip_type TEXT NOT NULL DEFAULT 'general',
    likes_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS social_tip_likes (
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    tip_id INTEGER NOT NULL REFERENCES social_tips(id) ON DELETE CASCADE,
    created_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (user_id, tip_id)
);

-- Challenges
CREATE TABLE IF NOT EXISTS challenges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT,
    challenge_type TEXT NOT NULL DEFAULT 'daily_limit',
    target_value REAL NOT NULL,
    target_unit TEXT NOT NULL DEFAULT 'kg_co2e',
    duration_days INTEGER NOT NULL DEFAULT 7,
    badge_name TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS user_challenges (
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    challenge_id INTEGER NOT NULL REFERENCES challenges(id),
    joined_at TEXT DEFAULT (datetime('now')),
    completed INTEGER NOT NULL DEFAULT 0,
    completed_at TEXT,
    PRIMARY KEY (user_id, challenge_id)
);

-- Create indexes
CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_lookup ON sessions(token_lookup);
CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
CREATE INDEX IF NOT EXISTS idx_scenarios_user ON scenarios(user_id, is_active);
CREATE INDEX IF NOT EXISTS idx_activities_scenario ON scenario_activities(scenario_id);
CREATE INDEX IF NOT EXISTS idx_activities_created ON scenario_activities(created_at);
CREATE INDEX IF NOT EXISTS idx_factors_lookup ON emission_factors(category, activity_type);
CREATE INDEX IF NOT EXISTS idx_social_likes_target ON social_likes(milestone_user_id);
CREATE INDEX IF NOT EXISTS idx_tips_created ON social_tips(created_at);
CREATE INDEX IF NOT EXISTS idx_user_challenges_challenge ON user_challenges(challenge_id);
"#;
