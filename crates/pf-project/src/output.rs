//! Binary results file.
//!
//! Layout: a 21-int header, an energy block (one int + six floats per pump,
//! then a demand-charge float), and one record of node/link floats per
//! reported time period. All ints and floats are 32-bit little-endian.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use pf_core::constants::{FT3_PER_L, GPM_PER_CFS, LPS_PER_CFS, MAGIC_NUMBER, VERSION};
use pf_core::error::FileError;
use pf_core::{Quantity, UnitSystem};
use pf_network::{LinkKind, Network, NodeType};

const INT_SIZE: u64 = 4;
const FLOAT_SIZE: u64 = 4;
const NUM_SYS_VARS: u64 = 21;
pub const NUM_NODE_VARS: usize = 6;
pub const NUM_LINK_VARS: usize = 7;
pub const NUM_PUMP_VARS: usize = 6;

#[derive(Default)]
pub struct OutputFile {
    path: Option<PathBuf>,
    writer: Option<File>,
    node_count: usize,
    link_count: usize,
    pump_count: usize,
    period_count: i32,
    energy_offset: u64,
    network_offset: u64,
}

impl OutputFile {
    pub fn open(&mut self, path: &Path) -> Result<(), FileError> {
        self.close();
        let file = File::create(path)
            .map_err(|_| FileError::CannotOpenOutputFile(path.display().to_string()))?;
        self.writer = Some(file);
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn close(&mut self) {
        self.writer = None;
    }

    /// Write the header and position the file at the results area.
    pub fn init_writer(&mut self, net: &Network) -> Result<(), FileError> {
        let Some(file) = self.writer.as_mut() else {
            return Ok(());
        };
        file.seek(SeekFrom::Start(0))
            .map_err(|_| FileError::CannotWriteToOutputFile)?;

        self.node_count = net.nodes.len();
        self.link_count = net.links.len();
        self.pump_count = net.pump_count();
        self.period_count = 0;

        self.energy_offset = NUM_SYS_VARS * INT_SIZE;
        self.network_offset = self.energy_offset
            + self.pump_count as u64 * (INT_SIZE + NUM_PUMP_VARS as u64 * FLOAT_SIZE)
            + FLOAT_SIZE;

        let header: [i32; NUM_SYS_VARS as usize] = [
            MAGIC_NUMBER,
            VERSION,
            0, // reserved for an error code
            0, // reserved for a warning flag
            self.energy_offset as i32,
            self.network_offset as i32,
            self.node_count as i32,
            self.link_count as i32,
            self.pump_count as i32,
            net.options.qual_type.ordinal(),
            net.options.trace_node.map(|i| i as i32).unwrap_or(-1),
            match net.options.unit_system {
                UnitSystem::US => 0,
                UnitSystem::SI => 1,
            },
            net.options.flow_units.ordinal(),
            net.options
                .pressure_units
                .map(|p| p.ordinal())
                .unwrap_or(0),
            net.options.qual_units.ordinal(),
            net.options.report_statistic,
            net.options.report_start as i32,
            net.options.report_step as i32,
            NUM_NODE_VARS as i32,
            NUM_LINK_VARS as i32,
            NUM_PUMP_VARS as i32,
        ];
        for value in header {
            file.write_all(&value.to_le_bytes())
                .map_err(|_| FileError::CannotWriteToOutputFile)?;
        }

        file.seek(SeekFrom::Start(self.network_offset))
            .map_err(|_| FileError::CannotWriteToOutputFile)?;
        Ok(())
    }

    /// Append one period of node and link results.
    pub fn write_network_results(&mut self, net: &Network) -> Result<(), FileError> {
        if self.writer.is_none() {
            return Ok(());
        }
        self.period_count += 1;
        self.write_node_results(net)?;
        self.write_link_results(net)?;
        Ok(())
    }

    fn write_node_results(&mut self, net: &Network) -> Result<(), FileError> {
        let lcf = net.ucf(Quantity::Length);
        let pcf = net.ucf(Quantity::Pressure);
        let qcf = net.ucf(Quantity::Flow);
        let ccf = net.ucf(Quantity::Concen);
        let file = self.writer.as_mut().expect("output file is open");

        for node in &net.nodes {
            let mut outflow = node.outflow;
            if node.node_type() != NodeType::Junction {
                outflow = -outflow;
            }
            // source nodes report their source-amended quality
            let quality = match &node.source {
                Some(source) => source.quality,
                None => node.quality,
            };
            let values: [f32; NUM_NODE_VARS] = [
                (node.head * lcf) as f32,
                ((node.head - node.elev) * pcf) as f32,
                (node.actual_demand * qcf) as f32,
                ((node.full_demand - node.actual_demand) * qcf) as f32,
                (outflow * qcf) as f32,
                (quality * ccf) as f32,
            ];
            for value in values {
                file.write_all(&value.to_le_bytes())
                    .map_err(|_| FileError::CannotWriteToOutputFile)?;
            }
        }
        Ok(())
    }

    fn write_link_results(&mut self, net: &Network) -> Result<(), FileError> {
        let lcf = net.ucf(Quantity::Length);
        let qcf = net.ucf(Quantity::Flow);
        let file = self.writer.as_mut().expect("output file is open");

        for link in &net.links {
            let mut hloss = link.get_unit_head_loss();
            if !matches!(link.kind, LinkKind::Pipe(_)) {
                hloss *= lcf;
            }
            let values: [f32; NUM_LINK_VARS] = [
                (link.flow * qcf) as f32,
                (link.leakage * qcf) as f32,
                (link.get_velocity() * lcf) as f32,
                hloss as f32,
                link.status.ordinal() as f32,
                link.get_setting(&net.units) as f32,
                (link.quality * FT3_PER_L) as f32,
            ];
            for value in values {
                file.write_all(&value.to_le_bytes())
                    .map_err(|_| FileError::CannotWriteToOutputFile)?;
            }
        }
        Ok(())
    }

    /// Write the energy block and patch the period count into the header.
    pub fn write_energy_results(
        &mut self,
        net: &Network,
        total_hrs: f64,
        peak_kwatts: f64,
    ) -> Result<(), FileError> {
        let Some(file) = self.writer.as_mut() else {
            return Ok(());
        };
        file.seek(SeekFrom::Start(self.energy_offset))
            .map_err(|_| FileError::CannotWriteToOutputFile)?;

        let total_hrs = if total_hrs == 0.0 { 24.0 } else { total_hrs };

        for (index, link) in net.links.iter().enumerate() {
            let LinkKind::Pump(pump) = &link.kind else { continue };
            let energy = &pump.energy;

            // kw-hr per million gallons, or per cubic meter in SI
            let cf = if net.options.unit_system == UnitSystem::SI {
                1000.0 / LPS_PER_CFS / 3600.0
            } else {
                1.0e6 / GPM_PER_CFS / 60.0
            };

            let values: [f32; NUM_PUMP_VARS] = [
                (energy.hrs_online / total_hrs * 100.0) as f32,
                energy.efficiency as f32,
                (energy.kw_hrs_per_cfs * cf) as f32,
                energy.kw_hrs as f32,
                energy.max_kwatts as f32,
                (energy.total_cost * 24.0 / total_hrs) as f32,
            ];
            file.write_all(&(index as i32).to_le_bytes())
                .map_err(|_| FileError::CannotWriteToOutputFile)?;
            for value in values {
                file.write_all(&value.to_le_bytes())
                    .map_err(|_| FileError::CannotWriteToOutputFile)?;
            }
        }

        let demand_charge = (peak_kwatts * net.options.peaking_charge) as f32;
        file.write_all(&demand_charge.to_le_bytes())
            .map_err(|_| FileError::CannotWriteToOutputFile)?;

        // patch the reported period count into the reserved header slot
        file.seek(SeekFrom::Start(2 * INT_SIZE))
            .map_err(|_| FileError::CannotWriteToOutputFile)?;
        file.write_all(&self.period_count.to_le_bytes())
            .map_err(|_| FileError::CannotWriteToOutputFile)?;
        file.flush().map_err(|_| FileError::CannotWriteToOutputFile)?;
        Ok(())
    }

    pub fn period_count(&self) -> i32 {
        self.period_count
    }
}

/// Reads results back for the report writer.
pub struct OutputReader {
    file: File,
    pub node_count: usize,
    pub link_count: usize,
    pub pump_count: usize,
    pub period_count: i32,
    energy_offset: u64,
    network_offset: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct PumpEnergyRecord {
    pub link_index: usize,
    pub values: [f32; NUM_PUMP_VARS],
}

impl OutputReader {
    pub fn open(path: &Path) -> Result<Self, FileError> {
        let mut file = File::open(path)
            .map_err(|_| FileError::CannotOpenOutputFile(path.display().to_string()))?;

        let mut header = [0i32; NUM_SYS_VARS as usize];
        let mut buf = [0u8; 4];
        for value in header.iter_mut() {
            file.read_exact(&mut buf)
                .map_err(|_| FileError::CannotOpenOutputFile(path.display().to_string()))?;
            *value = i32::from_le_bytes(buf);
        }
        if header[0] != MAGIC_NUMBER {
            return Err(FileError::CannotOpenOutputFile(path.display().to_string()));
        }

        Ok(Self {
            file,
            node_count: header[6] as usize,
            link_count: header[7] as usize,
            pump_count: header[8] as usize,
            period_count: header[2],
            energy_offset: header[4] as u64,
            network_offset: header[5] as u64,
        })
    }

    fn read_f32(&mut self) -> Result<f32, FileError> {
        let mut buf = [0u8; 4];
        self.file
            .read_exact(&mut buf)
            .map_err(|_| FileError::CannotWriteToReportFile)?;
        Ok(f32::from_le_bytes(buf))
    }

    fn read_i32(&mut self) -> Result<i32, FileError> {
        let mut buf = [0u8; 4];
        self.file
            .read_exact(&mut buf)
            .map_err(|_| FileError::CannotWriteToReportFile)?;
        Ok(i32::from_le_bytes(buf))
    }

    /// Energy usage records for every pump, plus the demand charge.
    pub fn read_energy_results(&mut self) -> Result<(Vec<PumpEnergyRecord>, f32), FileError> {
        self.file
            .seek(SeekFrom::Start(self.energy_offset))
            .map_err(|_| FileError::CannotWriteToReportFile)?;
        let mut records = Vec::with_capacity(self.pump_count);
        for _ in 0..self.pump_count {
            let link_index = self.read_i32()? as usize;
            let mut values = [0f32; NUM_PUMP_VARS];
            for value in values.iter_mut() {
                *value = self.read_f32()?;
            }
            records.push(PumpEnergyRecord { link_index, values });
        }
        let demand_charge = self.read_f32()?;
        Ok((records, demand_charge))
    }

    /// All node then link variables for one reporting period.
    pub fn read_period(&mut self, period: i32) -> Result<(Vec<[f32; 6]>, Vec<[f32; 7]>), FileError> {
        let record_size = (self.node_count * NUM_NODE_VARS + self.link_count * NUM_LINK_VARS)
            as u64
            * FLOAT_SIZE;
        let offset = self.network_offset + period as u64 * record_size;
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|_| FileError::CannotWriteToReportFile)?;

        let mut nodes = Vec::with_capacity(self.node_count);
        for _ in 0..self.node_count {
            let mut values = [0f32; NUM_NODE_VARS];
            for value in values.iter_mut() {
                *value = self.read_f32()?;
            }
            nodes.push(values);
        }
        let mut links = Vec::with_capacity(self.link_count);
        for _ in 0..self.link_count {
            let mut values = [0f32; NUM_LINK_VARS];
            for value in values.iter_mut() {
                *value = self.read_f32()?;
            }
            links.push(values);
        }
        Ok((nodes, links))
    }
}
