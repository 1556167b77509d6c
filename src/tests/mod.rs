#[cfg(test)]
// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod allocator_tests;
pub mod metrics_tests;
