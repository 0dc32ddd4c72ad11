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

//! hbm-repair - HBM lane and row repair over the IEEE1500 scan chain
//!
//! This library re-exports the repair engine and adds logging setup for
//! tools that drive it.

pub mod logger;

pub use hr_core::{
    codec, constants, data, device, dispatch, engine, hw, settings, wir, Bank, BatchReport, Byte,
    Channel, DieVariant, Dword, FbpaSubp, FuseGuard, GpuArch, GpuLane, GpuRow, HbmDevice, HbmDie,
    HbmInterface, HbmLane, HbmModel, HbmRow, HbmVendor, LaneBurnOrder, LaneRepairType, LaneType,
    PseudoChannel, RepairMode, RepairOutcome, RepairOverrides, RepairSettings, RepairStatus,
    RepairTarget, Row, ScanChain, ScanLock, SimulatedHbm, Site, SpecVersion, Stack, Transport,
    Translator, WdrData, Wir, WirRegistry, WirType, WriteOutcome,
};
pub use hr_error::{HbmRepairError, Result};
