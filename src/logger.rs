/*
 * This file is part of hbm-repair.
 *
 * Copyright (C) 2025 hbm-repair contributors
 *
 * hbm-repair is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * hbm-repair is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with hbm-repair. If not, see <https://www.gnu.org/licenses/>.
 */

//! Logging setup for tools built on the repair engine

use tracing_subscriber::EnvFilter;

/// Level used when neither the caller nor `RUST_LOG` picks one
pub const DEFAULT_LEVEL: &str = "info";

/// Install a stdout subscriber filtered at `level`
///
/// `RUST_LOG` takes precedence over `level`. Returns `false` when a global
/// subscriber was already installed, which leaves that one in place.
pub fn init_logging(level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}
