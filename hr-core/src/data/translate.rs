//! GPU to HBM coordinate translation
//!
//! The GPU reports faults by physical FBPA, subpartition and bit position on
//! the 256-bit subpartition bus. Each subpartition carries two HBM channels
//! of four DWORDs each; the platform's floorsweeping topology decides which
//! site and channel sit behind a given FBPA/subpartition.

use hr_vendor::GpuArch;
use tracing::trace;

use super::coords::{
    Bank, Byte, Channel, Dword, FbpaSubp, GpuLane, GpuRow, HbmLane, HbmRow, LaneRepairType,
    LaneType, Row, Site, Stack,
};
use crate::constants::arch::{self, ArchParams};
use crate::constants::{hbm, lane};
use crate::error::{HbmRepairError, Result};
use crate::hw::Transport;

const BITS_PER_DWORD: u32 = lane::DWORD_WIDTH_BITS;

pub struct Translator<'a> {
    transport: &'a dyn Transport,
    params: ArchParams,
}

impl<'a> Translator<'a> {
    pub fn new(transport: &'a dyn Transport, arch: GpuArch) -> Self {
        Self {
            transport,
            params: arch::params(arch),
        }
    }

    pub fn params(&self) -> &ArchParams {
        &self.params
    }

    /// Sites present on this architecture, floorswept or not
    pub fn sites(&self) -> impl Iterator<Item = Site> {
        Site::all().take(self.params.sites as usize)
    }

    /// Sites that are not floorswept
    pub fn active_sites(&self) -> Result<Vec<Site>> {
        let mut active = Vec::new();
        for site in self.sites() {
            if self.transport.hbm_site_master_fbpa(site)?.is_some() {
                active.push(site);
            }
        }
        Ok(active)
    }

    /// DWORD index on the subpartition bus for a channel DWORD
    pub fn subp_dword(channel: Channel, dword: Dword) -> u32 {
        (channel.value() % arch::CHANNELS_PER_SUBP) * hbm::DWORDS_PER_CHANNEL + dword.value()
    }

    /// Find the site and channel behind a subpartition channel
    pub fn find_channel(&self, location: FbpaSubp, subp_channel: u32) -> Result<Option<(Site, Channel)>> {
        if location.subp >= arch::SUBPS_PER_FBPA || subp_channel >= arch::CHANNELS_PER_SUBP {
            return Err(HbmRepairError::invalid_coordinate(format!(
                "{} channel {} out of range",
                location, subp_channel
            )));
        }
        for site in self.sites() {
            if self.transport.hbm_site_master_fbpa(site)?.is_none() {
                continue;
            }
            for channel in Channel::all().filter(|c| c.value() % arch::CHANNELS_PER_SUBP == subp_channel) {
                if self.transport.hbm_site_channel_to_hw_fbpa_subp(site, channel)? == Some(location) {
                    trace!("{} channel {} is {} {}", location, subp_channel, site, channel);
                    return Ok(Some((site, channel)));
                }
            }
        }
        Ok(None)
    }

    fn location_of(&self, site: Site, channel: Channel) -> Result<Option<FbpaSubp>> {
        if site.value() >= self.params.sites {
            return Err(HbmRepairError::invalid_coordinate(format!(
                "{} does not exist on {}",
                site, self.params.arch
            )));
        }
        self.transport.hbm_site_channel_to_hw_fbpa_subp(site, channel)
    }

    /// `None` when no active channel is wired to the lane
    pub fn gpu_lane_to_hbm(&self, gpu: &GpuLane) -> Result<Option<HbmLane>> {
        let bus_bits = self.params.subp_bus_width_bits;
        let (subp_dword, byte, repair) = match gpu.lane_type {
            LaneType::Data => {
                if gpu.lane_bit >= bus_bits {
                    return Err(HbmRepairError::invalid_coordinate(format!(
                        "data lane {} beyond the {}-bit subpartition bus",
                        gpu.lane_bit, bus_bits
                    )));
                }
                let bit_in_dword = gpu.lane_bit % BITS_PER_DWORD;
                (
                    gpu.lane_bit / BITS_PER_DWORD,
                    bit_in_dword / hbm::BITS_PER_BYTE,
                    LaneRepairType::data(bit_in_dword % hbm::BITS_PER_BYTE)?,
                )
            }
            LaneType::Dbi | LaneType::Dm => {
                let bus_bytes = bus_bits / hbm::BITS_PER_BYTE;
                if gpu.lane_bit >= bus_bytes {
                    return Err(HbmRepairError::invalid_coordinate(format!(
                        "{} lane {} beyond the {} bytes of the subpartition bus",
                        gpu.lane_type, gpu.lane_bit, bus_bytes
                    )));
                }
                let repair = if gpu.lane_type == LaneType::Dbi {
                    LaneRepairType::Dbi
                } else {
                    LaneRepairType::Dm
                };
                (
                    gpu.lane_bit / hbm::BYTES_PER_DWORD,
                    gpu.lane_bit % hbm::BYTES_PER_DWORD,
                    repair,
                )
            }
        };

        let subp_channel = subp_dword / hbm::DWORDS_PER_CHANNEL;
        let Some((site, channel)) = self.find_channel(gpu.location(), subp_channel)? else {
            return Ok(None);
        };
        Ok(Some(HbmLane {
            site,
            channel,
            dword: Dword::new(subp_dword % hbm::DWORDS_PER_CHANNEL)?,
            byte: Byte::new(byte)?,
            repair,
        }))
    }

    /// `None` when the channel is floorswept
    pub fn hbm_lane_to_gpu(&self, hbm_lane: &HbmLane) -> Result<Option<GpuLane>> {
        let Some(location) = self.location_of(hbm_lane.site, hbm_lane.channel)? else {
            return Ok(None);
        };
        let subp_dword = Self::subp_dword(hbm_lane.channel, hbm_lane.dword);
        let (lane_bit, lane_type) = match hbm_lane.repair {
            LaneRepairType::Data(bit) => (
                subp_dword * BITS_PER_DWORD + hbm_lane.byte.value() * hbm::BITS_PER_BYTE + u32::from(bit),
                LaneType::Data,
            ),
            LaneRepairType::Dbi => (subp_dword * hbm::BYTES_PER_DWORD + hbm_lane.byte.value(), LaneType::Dbi),
            LaneRepairType::Dm => (subp_dword * hbm::BYTES_PER_DWORD + hbm_lane.byte.value(), LaneType::Dm),
        };
        Ok(Some(GpuLane {
            hw_fbpa: location.hw_fbpa,
            subp: location.subp,
            lane_bit,
            lane_type,
        }))
    }

    /// `None` when no active channel is wired to the row
    pub fn gpu_row_to_hbm(&self, gpu: &GpuRow) -> Result<Option<HbmRow>> {
        let stack = Stack::new(gpu.rank)?;
        let bank = Bank::new(gpu.bank)?;
        let row = Row::new(gpu.row)?;
        let Some((site, channel)) = self.find_channel(gpu.location(), gpu.subp_channel)? else {
            return Ok(None);
        };
        Ok(Some(HbmRow {
            site,
            stack,
            channel,
            bank,
            row,
        }))
    }

    /// `None` when the channel is floorswept
    pub fn hbm_row_to_gpu(&self, hbm_row: &HbmRow) -> Result<Option<GpuRow>> {
        let Some(location) = self.location_of(hbm_row.site, hbm_row.channel)? else {
            return Ok(None);
        };
        Ok(Some(GpuRow {
            hw_fbpa: location.hw_fbpa,
            subp: location.subp,
            subp_channel: hbm_row.channel.value() % arch::CHANNELS_PER_SUBP,
            rank: hbm_row.stack.value(),
            bank: hbm_row.bank.value(),
            row: hbm_row.row.value(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::transport::MockTransport;

    /// Two FBPAs per site, channels 0-3 on the first, site 1 floorswept
    fn topology() -> MockTransport {
        let mut mock = MockTransport::new();
        mock.expect_hbm_site_master_fbpa().returning(|site| {
            Ok((site.value() != 1).then(|| site.value() * 2))
        });
        mock.expect_hbm_site_channel_to_hw_fbpa_subp().returning(|site, channel| {
            Ok((site.value() != 1).then(|| FbpaSubp {
                hw_fbpa: site.value() * 2 + channel.value() / 4,
                subp: (channel.value() % 4) / 2,
            }))
        });
        mock
    }

    #[test]
    fn test_data_lane_translation() {
        let mock = topology();
        let translator = Translator::new(&mock, GpuArch::Gv100);
        let gpu = GpuLane {
            hw_fbpa: 5,
            subp: 1,
            lane_bit: 4 * 32 + 2 * 8 + 6,
            lane_type: LaneType::Data,
        };
        let hbm_lane = translator.gpu_lane_to_hbm(&gpu).unwrap().unwrap();
        assert_eq!(hbm_lane.site.value(), 2);
        assert_eq!(hbm_lane.channel.value(), 7);
        assert_eq!(hbm_lane.dword.value(), 0);
        assert_eq!(hbm_lane.byte.value(), 2);
        assert_eq!(hbm_lane.repair, LaneRepairType::Data(6));

        assert_eq!(translator.hbm_lane_to_gpu(&hbm_lane).unwrap(), Some(gpu));
    }

    #[test]
    fn test_byte_lane_translation() {
        let mock = topology();
        let translator = Translator::new(&mock, GpuArch::Ga100);
        for lane_type in [LaneType::Dbi, LaneType::Dm] {
            for lane_bit in [0, 13, 31] {
                let gpu = GpuLane {
                    hw_fbpa: 8,
                    subp: 0,
                    lane_bit,
                    lane_type,
                };
                let hbm_lane = translator.gpu_lane_to_hbm(&gpu).unwrap().unwrap();
                assert_eq!(hbm_lane.site.value(), 4);
                assert_eq!(translator.hbm_lane_to_gpu(&hbm_lane).unwrap(), Some(gpu));
            }
        }
    }

    #[test]
    fn test_floorswept_site_has_no_channel() {
        let mock = topology();
        let translator = Translator::new(&mock, GpuArch::Gv100);
        let gpu = GpuRow {
            hw_fbpa: 2,
            subp: 0,
            subp_channel: 1,
            rank: 0,
            bank: 3,
            row: 0x40,
        };
        assert_eq!(translator.gpu_row_to_hbm(&gpu).unwrap(), None);
        assert_eq!(
            translator.active_sites().unwrap().iter().map(|s| s.value()).collect::<Vec<_>>(),
            vec![0, 2, 3]
        );
    }

    #[test]
    fn test_row_translation_round_trip() {
        let mock = topology();
        let translator = Translator::new(&mock, GpuArch::Gv100);
        let gpu = GpuRow {
            hw_fbpa: 7,
            subp: 0,
            subp_channel: 1,
            rank: 1,
            bank: 9,
            row: 0x2345,
        };
        let hbm_row = translator.gpu_row_to_hbm(&gpu).unwrap().unwrap();
        assert_eq!(hbm_row.site.value(), 3);
        assert_eq!(hbm_row.channel.value(), 5);
        assert_eq!(translator.hbm_row_to_gpu(&hbm_row).unwrap(), Some(gpu));
    }

    #[test]
    fn test_out_of_range_lane_rejected() {
        let mock = topology();
        let translator = Translator::new(&mock, GpuArch::Gv100);
        let gpu = GpuLane {
            hw_fbpa: 0,
            subp: 0,
            lane_bit: 32,
            lane_type: LaneType::Dm,
        };
        assert!(matches!(
            translator.gpu_lane_to_hbm(&gpu),
            Err(HbmRepairError::InvalidCoordinate(_))
        ));
    }
}
