//! The project driver: owns the network, both engines, and the output
//! files, and sequences a full extended-period run.

use std::fs;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::output::{OutputFile, OutputReader};
use crate::reader::InputReader;
use crate::report::ReportWriter;
use crate::summary::RunSummary;
use crate::writer::write_project;
use pf_core::error::{EngineError, FileError, InputError, SystemError};
use pf_network::{validate_network, IfUnbalanced, Network, QualType};
use pf_sim::{HydEngine, QualEngine};
use pf_solver::HydSolverStatus;

#[derive(Default)]
pub struct Project {
    pub network: Network,
    hyd_engine: HydEngine,
    qual_engine: QualEngine,
    output: OutputFile,

    inp_path: Option<PathBuf>,
    rpt_path: Option<PathBuf>,
    scratch_output: bool,

    network_empty: bool,
    hyd_engine_opened: bool,
    qual_engine_opened: bool,
    solver_initialized: bool,
    run_quality: bool,
}

impl Project {
    pub fn new() -> Self {
        let mut project = Self::default();
        project.network_empty = true;
        project
    }

    /// Open (and truncate) the report file up front so failures surface
    /// before a long run.
    pub fn open_report(&mut self, path: &Path) -> Result<(), EngineError> {
        File::create(path)
            .map_err(|_| FileError::CannotOpenReportFile(path.display().to_string()))?;
        self.rpt_path = Some(path.to_path_buf());
        Ok(())
    }

    /// Load a project from an input file.
    pub fn load(&mut self, path: &Path) -> Result<(), EngineError> {
        if let Some(rpt) = &self.rpt_path {
            if rpt == path {
                return Err(FileError::DuplicateFileNames.into());
            }
        }
        let text = fs::read_to_string(path)
            .map_err(|_| FileError::CannotOpenInputFile(path.display().to_string()))?;
        self.inp_path = Some(path.to_path_buf());
        self.load_from_str(&text)
    }

    /// Load a project from input text (the file-free path used by tests).
    pub fn load_from_str(&mut self, text: &str) -> Result<(), EngineError> {
        self.clear();
        InputReader::new().read(text, &mut self.network)?;

        self.network.convert_units();
        self.network.options.adjust();
        self.resolve_trace_node()?;

        self.network_empty = false;
        self.run_quality = self.network.options.qual_type != QualType::NoQual;
        info!(
            nodes = self.network.nodes.len(),
            links = self.network.links.len(),
            "project loaded"
        );
        Ok(())
    }

    /// Save the project back out as input text.
    pub fn save(&mut self, path: &Path) -> Result<(), EngineError> {
        if self.network_empty {
            return Ok(());
        }
        fs::write(path, write_project(&self.network))
            .map_err(|_| FileError::CannotOpenOutputFile(path.display().to_string()))?;
        Ok(())
    }

    pub fn save_to_string(&self) -> String {
        write_project(&self.network)
    }

    /// Open the binary output file; an empty path selects a scratch file in
    /// the system temp directory.
    pub fn open_output(&mut self, path: &str) -> Result<(), EngineError> {
        let path_buf = if path.is_empty() {
            self.scratch_output = true;
            std::env::temp_dir().join(format!("pipeflow-{}.out", std::process::id()))
        } else {
            self.scratch_output = false;
            PathBuf::from(path)
        };
        if let Some(rpt) = &self.rpt_path {
            if *rpt == path_buf {
                return Err(FileError::DuplicateFileNames.into());
            }
        }
        self.output.open(&path_buf)?;
        Ok(())
    }

    /// Validate the network and prepare both engines for a run.
    pub fn init_solver(&mut self, init_flows: bool) -> Result<(), EngineError> {
        if self.network_empty {
            return Ok(());
        }
        self.solver_initialized = false;
        validate_network(&mut self.network)?;

        let mut init_flows = init_flows;
        if !self.hyd_engine_opened {
            init_flows = true;
            self.hyd_engine.open(&mut self.network);
            self.hyd_engine_opened = true;
        }
        self.hyd_engine.init(&mut self.network, init_flows);

        if self.run_quality {
            if !self.qual_engine_opened {
                self.qual_engine.open(&self.network);
                self.qual_engine_opened = true;
            }
            self.qual_engine.init(&mut self.network);
        }

        self.solver_initialized = true;
        self.output.init_writer(&self.network)?;
        Ok(())
    }

    /// Solve hydraulics at the current time, recording results when a
    /// reporting boundary is hit. Returns the solver status.
    pub fn run_solver(&mut self, t: &mut i64) -> Result<HydSolverStatus, EngineError> {
        if !self.solver_initialized {
            return Err(SystemError::SolverNotInitialized.into());
        }
        let status = self.hyd_engine.solve(&mut self.network, t);

        if status == HydSolverStatus::Successful && self.output.is_open() {
            let opts = &self.network.options;
            if *t >= opts.report_start && (*t - opts.report_start) % opts.report_step == 0 {
                self.output.write_network_results(&self.network)?;
            }
        }
        Ok(status)
    }

    /// Advance to the next hydraulic event, transporting quality over the
    /// step taken.
    pub fn advance_solver(&mut self, tstep: &mut i64) -> Result<(), EngineError> {
        self.hyd_engine.advance(&mut self.network, tstep);
        if self.run_quality && *tstep > 0 {
            self.qual_engine.solve(&mut self.network, *tstep);
        }
        Ok(())
    }

    /// Run a complete simulation: load, solve every period, write the
    /// binary results, the text report, and the JSON run summary.
    pub fn run(&mut self, inp: &Path, rpt: &Path, out: &str) -> Result<(), EngineError> {
        let result = self.try_run(inp, rpt, out);
        if let Err(err) = &result {
            self.network.msg_log.push(err.to_string());
            error!(code = err.code(), "run failed: {err}");
        }
        // always leave a report behind, even for failed runs
        let _ = self.write_report();
        result
    }

    fn try_run(&mut self, inp: &Path, rpt: &Path, out: &str) -> Result<(), EngineError> {
        self.open_report(rpt)?;
        self.load(inp)?;
        self.open_output(out)?;
        self.init_solver(false)?;

        let mut unbalanced = false;
        loop {
            let mut t = 0;
            let status = self.run_solver(&mut t)?;
            match status {
                HydSolverStatus::Successful => {}
                HydSolverStatus::FailedNoConvergence => {
                    if self.network.options.if_unbalanced == IfUnbalanced::Stop {
                        return Err(SystemError::HydraulicsSolverFailure.into());
                    }
                    unbalanced = true;
                }
                HydSolverStatus::FailedIllConditioned { .. } => {
                    return Err(SystemError::HydraulicsSolverFailure.into());
                }
            }

            let mut tstep = 0;
            self.advance_solver(&mut tstep)?;
            if tstep == 0 {
                break;
            }
        }

        self.finish_run()?;
        if unbalanced {
            info!("run finished with unconverged periods");
        }
        Ok(())
    }

    /// Flush the energy block and the quality mass balance at end of run.
    fn finish_run(&mut self) -> Result<(), EngineError> {
        let total_hrs = self.hyd_engine.current_time() as f64 / 3600.0;
        self.output
            .write_energy_results(&self.network, total_hrs, self.hyd_engine.peak_kwatts())?;
        if self.run_quality {
            let balance = self.qual_engine.balance;
            balance.write(&mut self.network.msg_log);
        }
        Ok(())
    }

    /// Write the text report from the status log and the output file.
    pub fn write_report(&mut self) -> Result<(), EngineError> {
        let Some(rpt_path) = self.rpt_path.clone() else {
            return Ok(());
        };
        let file = File::create(&rpt_path)
            .map_err(|_| FileError::CannotOpenReportFile(rpt_path.display().to_string()))?;
        let mut writer = BufWriter::new(file);

        let input_name = self
            .inp_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        let mut reader = self
            .output
            .path()
            .and_then(|p| OutputReader::open(p).ok());
        ReportWriter::new(&self.network)
            .write_report(&input_name, reader.as_mut(), &mut writer)
            .map_err(|_| FileError::CannotWriteToReportFile)?;
        Ok(())
    }

    /// A machine-readable digest of the run so far.
    pub fn run_summary(&self) -> RunSummary {
        let input_name = self
            .inp_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let mass_balance = if self.run_quality {
            Some(&self.qual_engine.balance)
        } else {
            None
        };
        RunSummary::new(
            &self.network,
            &input_name,
            self.hyd_engine.step_count(),
            self.hyd_engine.total_trials(),
            self.output.period_count(),
            self.hyd_engine.peak_kwatts(),
            mass_balance,
        )
    }

    /// Write the run summary as JSON.
    pub fn write_summary_json(&self, path: &Path) -> Result<(), EngineError> {
        let json = self
            .run_summary()
            .to_json()
            .map_err(|_| FileError::CannotWriteToReportFile)?;
        fs::write(path, json)
            .map_err(|_| FileError::CannotOpenOutputFile(path.display().to_string()))?;
        Ok(())
    }

    fn clear(&mut self) {
        self.network = Network::new();
        self.network_empty = true;
        self.hyd_engine_opened = false;
        self.qual_engine_opened = false;
        self.solver_initialized = false;
        self.hyd_engine = HydEngine::new();
        self.qual_engine = QualEngine::new();
    }

    fn resolve_trace_node(&mut self) -> Result<(), EngineError> {
        if self.network.options.qual_type == QualType::Trace {
            let name = self.network.options.trace_node_name.clone();
            let index = self
                .network
                .node_index(&name)
                .ok_or(InputError::UndefinedObject(name))?;
            self.network.options.trace_node = Some(index);
        }
        Ok(())
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        // scratch output files do not outlive the project
        if self.scratch_output {
            if let Some(path) = self.output.path().map(Path::to_path_buf) {
                self.output.close();
                let _ = fs::remove_file(path);
            }
        }
    }
}
