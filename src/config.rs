// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Configuration constants.

use std::time::Duration;

/// Key of the shared counter document.
pub const COUNTER_KEY: &str = "sequenceId";

/// Bound on every individual store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Records returned by a recency query when no usable count is given.
pub const DEFAULT_RECENT_COUNT: usize = 10;

/// Upper bound on a single recency query.
pub const MAX_RECENT_COUNT: usize = 1000;
