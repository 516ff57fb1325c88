/// Default branch synced and used as the merge target.
pub const DEFAULT_BRANCH: &str = "main";

/// Default lookback window (days before the latest known commit) for incremental syncs.
pub const DEFAULT_DAYS_BEFORE: i64 = 2;

/// Factor applied to the lookback window when no overlap with local history is found.
pub const LOOKBACK_GROWTH_FACTOR: i64 = 5;

/// Lookback ceiling in days. Widening stops once the window reaches this value.
pub const LOOKBACK_CAP_DAYS: i64 = 250;

/// Minimum window used by push-triggered syncs.
pub const PUSH_MIN_DAYS_BEFORE: i64 = 2;

/// Length of the abbreviated commit hash.
pub const SHORT_SHA_LEN: usize = 7;

/// Default number of commits returned by the nearby-commits window.
pub const DEFAULT_NEARBY_LIMIT: usize = 11;

/// Window size used when deriving previous/next navigation for a commit page.
pub const NAVIGATION_WINDOW: usize = 7;

/// Commits per page when listing a branch.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Maximum length of a rendered commit message first line.
pub const MESSAGE_FIRST_LINE_MAX: usize = 70;

/// Default data directory name under home.
pub const DEFAULT_DATA_DIR: &str = ".testhub";

/// Project config file name.
pub const PROJECT_CONFIG_FILE: &str = ".testhub/config.toml";

/// SQLite database file name.
pub const STATE_DB_FILE: &str = "state.db";

/// Default path template of the per-module test list file.
pub const DEFAULT_TEST_LIST_PATH: &str = "{module}/test_suite/do1_test_source";

/// Special revision names understood by commit resolution.
pub const REV_HEAD: &str = "head";
pub const REV_AUTO: &str = "auto";
