pub const CREATE_GOALS: &str = r#"
CREATE TABLE IF NOT EXISTS goals (
  id         INTEGER PRIMARY KEY AUTOINCREMENT,
  name       TEXT NOT NULL UNIQUE,
  created_at TEXT NOT NULL
);
"#;

pub const CREATE_CHECKS: &str = r#"
CREATE TABLE IF NOT EXISTS checks (
  goal_id INTEGER NOT NULL,
  day     TEXT NOT NULL,
  done    INTEGER NOT NULL CHECK (done IN (0, 1)),
  PRIMARY KEY (goal_id, day),
  FOREIGN KEY (goal_id) REFERENCES goals(id) ON DELETE CASCADE
);
"#;

pub const INDEX_CHECKS_DAY: &str = "CREATE INDEX IF NOT EXISTS idx_checks_day ON checks(day);";

pub fn schema_statements() -> Vec<&'static str> {
    vec![CREATE_GOALS, CREATE_CHECKS, INDEX_CHECKS_DAY]
}
