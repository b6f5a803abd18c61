// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Command-line parsing tests, split by category.

use super::*;
