//! Shared constants for end-to-end tests
//!
//! When test data changes (user credentials, catalog IDs, etc.),
//! update only this file.

// ============================================================================
// Test User Credentials
// ============================================================================

/// Editor test user handle
pub const EDITOR_USER: &str = "editor";

/// Editor test user password
pub const EDITOR_PASS: &str = "editorpass123";

/// A second editor, for concurrent edit scenarios
pub const EDITOR_2_USER: &str = "editor2";

/// Second editor password
pub const EDITOR_2_PASS: &str = "editor2pass123";

/// Read-only test user handle
pub const VIEWER_USER: &str = "viewer";

/// Read-only test user password
pub const VIEWER_PASS: &str = "viewerpass123";

/// Admin test user handle
pub const ADMIN_USER: &str = "admin";

/// Admin test user password
pub const ADMIN_PASS: &str = "adminpass123";

// ============================================================================
// Test Catalog IDs
// ============================================================================

/// Artist "Foo"
pub const ARTIST_1_ID: &str = "ar_001";
pub const ARTIST_1_NAME: &str = "Foo";

/// Artist "Kaito"
pub const ARTIST_2_ID: &str = "ar_002";
pub const ARTIST_2_NAME: &str = "Kaito";

/// Circle "Sound Holic"
pub const CIRCLE_1_ID: &str = "ci_001";

/// Event "Reitaisai 20"
pub const EVENT_1_ID: &str = "ev_001";

/// Release "First Press" by circle 1 at event 1
pub const RELEASE_1_ID: &str = "re_001";
pub const RELEASE_1_CATALOG_NUMBER: &str = "SHCD-0001";

/// Track 1 of release 1
pub const TRACK_1_ID: &str = "tr_001";

/// Track 2 of release 1
pub const TRACK_2_ID: &str = "tr_002";

/// An ID that exists for no entity kind
pub const MISSING_ID: &str = "zz_missing";

/// Number of seeded artists
pub const ARTIST_COUNT: usize = 2;

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for the server to answer its home route
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between readiness polls
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

/// Per-request timeout of the test client
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
