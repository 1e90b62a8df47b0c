//! Text report writer.
//!
//! Produces the run summary, the accumulated status log, the pump energy
//! table, and per-period node/link result tables read back from the binary
//! output file.

use std::io::{self, Write};

use chrono::Local;

use crate::output::OutputReader;
use pf_core::clock::format_time;
use pf_core::Quantity;
use pf_network::{LinkStatus, Network, NodeType, ReportedItems};

const BANNER: &str = "PIPEFLOW - a pressurized pipe network simulator";

pub struct ReportWriter<'a> {
    net: &'a Network,
}

impl<'a> ReportWriter<'a> {
    pub fn new(net: &'a Network) -> Self {
        Self { net }
    }

    /// Write the complete report.
    pub fn write_report(
        &self,
        input_file: &str,
        reader: Option<&mut OutputReader>,
        w: &mut dyn Write,
    ) -> io::Result<()> {
        writeln!(w, "  {BANNER}")?;
        writeln!(w, "  Run at {}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(w)?;
        for line in &self.net.title {
            writeln!(w, "  {line}")?;
        }

        if self.net.options.report_summary {
            self.write_summary(input_file, w)?;
        }

        // the status log collected during the run
        if !self.net.msg_log.is_empty() {
            writeln!(w)?;
            for line in self.net.msg_log.lines() {
                writeln!(w, "{line}")?;
            }
        }

        if let Some(reader) = reader {
            if self.net.options.report_energy {
                self.write_energy(reader, w)?;
            }
            self.write_results(reader, w)?;
        }
        Ok(())
    }

    fn write_summary(&self, input_file: &str, w: &mut dyn Write) -> io::Result<()> {
        let net = self.net;
        let junctions = net
            .nodes
            .iter()
            .filter(|n| n.node_type() == NodeType::Junction)
            .count();
        let reservoirs = net
            .nodes
            .iter()
            .filter(|n| n.node_type() == NodeType::Reservoir)
            .count();
        let tanks = net
            .nodes
            .iter()
            .filter(|n| n.node_type() == NodeType::Tank)
            .count();
        let pumps = net.pump_count();
        let valves = net
            .links
            .iter()
            .filter(|l| l.valve().is_some())
            .count();
        let pipes = net.links.len() - pumps - valves;

        writeln!(w)?;
        writeln!(w, "  Input Data File ............... {input_file}")?;
        writeln!(w, "  Number of Junctions ........... {junctions}")?;
        writeln!(w, "  Number of Reservoirs .......... {reservoirs}")?;
        writeln!(w, "  Number of Tanks ............... {tanks}")?;
        writeln!(w, "  Number of Pipes ............... {pipes}")?;
        writeln!(w, "  Number of Pumps ............... {pumps}")?;
        writeln!(w, "  Number of Valves .............. {valves}")?;
        writeln!(
            w,
            "  Flow Units .................... {}",
            net.options.flow_units.label()
        )?;
        writeln!(
            w,
            "  Head Loss Model ............... {}",
            net.options.headloss_model.label()
        )?;
        writeln!(
            w,
            "  Demand Model .................. {}",
            net.options.demand_model.label()
        )?;
        writeln!(
            w,
            "  Quality Model ................. {}",
            net.options.qual_name
        )?;
        writeln!(
            w,
            "  Hydraulic Time Step ........... {}",
            format_time(net.options.hyd_step)
        )?;
        writeln!(
            w,
            "  Total Duration ................ {}",
            format_time(net.options.total_duration)
        )?;
        Ok(())
    }

    fn write_energy(&self, reader: &mut OutputReader, w: &mut dyn Write) -> io::Result<()> {
        let (records, demand_charge) = match reader.read_energy_results() {
            Ok(result) => result,
            Err(_) => return Ok(()),
        };
        if records.is_empty() {
            return Ok(());
        }

        writeln!(w)?;
        writeln!(w, "  Energy Usage")?;
        writeln!(w, "  ------------")?;
        writeln!(
            w,
            "  {:<16}{:>10}{:>10}{:>12}{:>10}{:>10}{:>12}",
            "Pump", "% Online", "% Effic", "kWh/Unit", "Avg kW", "Peak kW", "Cost/day"
        )?;
        let mut total_cost = 0.0;
        for record in &records {
            let name = &self.net.links[record.link_index].name;
            writeln!(
                w,
                "  {:<16}{:>10.2}{:>10.2}{:>12.2}{:>10.2}{:>10.2}{:>12.2}",
                name,
                record.values[0],
                record.values[1],
                record.values[2],
                record.values[3],
                record.values[4],
                record.values[5]
            )?;
            total_cost += record.values[5] as f64;
        }
        writeln!(w, "  Demand Charge: {demand_charge:.2}")?;
        writeln!(w, "  Total Cost:    {:.2}", total_cost + demand_charge as f64)?;
        Ok(())
    }

    fn write_results(&self, reader: &mut OutputReader, w: &mut dyn Write) -> io::Result<()> {
        let net = self.net;
        let report_nodes = net.options.report_nodes == ReportedItems::All;
        let report_links = net.options.report_links == ReportedItems::All;
        if !report_nodes && !report_links {
            return Ok(());
        }

        let mut time = net.options.report_start;
        for period in 0..reader.period_count {
            let (nodes, links) = match reader.read_period(period) {
                Ok(results) => results,
                Err(_) => break,
            };

            if report_nodes {
                writeln!(w)?;
                writeln!(w, "  Node Results at {}", format_time(time))?;
                writeln!(
                    w,
                    "  {:<16}{:>10}{:>10}{:>10}{:>10}{:>10}{:>10}",
                    "Node", "Head", "Pressure", "Demand", "Deficit", "Outflow", "Quality"
                )?;
                writeln!(
                    w,
                    "  {:<16}{:>10}{:>10}{:>10}{:>10}{:>10}{:>10}",
                    "",
                    net.units.name(Quantity::Length),
                    net.units.name(Quantity::Pressure),
                    net.units.name(Quantity::Flow),
                    net.units.name(Quantity::Flow),
                    net.units.name(Quantity::Flow),
                    net.options.qual_units.label()
                )?;
                for (node, values) in net.nodes.iter().zip(&nodes) {
                    writeln!(
                        w,
                        "  {:<16}{:>10.3}{:>10.3}{:>10.3}{:>10.3}{:>10.3}{:>10.3}",
                        node.name,
                        values[0],
                        values[1],
                        values[2],
                        values[3],
                        values[4],
                        values[5]
                    )?;
                }
            }

            if report_links {
                writeln!(w)?;
                writeln!(w, "  Link Results at {}", format_time(time))?;
                writeln!(
                    w,
                    "  {:<16}{:>10}{:>10}{:>10}{:>10}{:>12}{:>10}{:>10}",
                    "Link", "Flow", "Leakage", "Velocity", "Headloss", "Status", "Setting", "Quality"
                )?;
                for (link, values) in net.links.iter().zip(&links) {
                    let status = match values[4] as i32 {
                        0 => LinkStatus::Closed.label(),
                        2 => LinkStatus::Active.label(),
                        3 => LinkStatus::TempClosed.label(),
                        _ => LinkStatus::Open.label(),
                    };
                    writeln!(
                        w,
                        "  {:<16}{:>10.3}{:>10.3}{:>10.3}{:>10.3}{:>12}{:>10.3}{:>10.3}",
                        link.name,
                        values[0],
                        values[1],
                        values[2],
                        values[3],
                        status,
                        values[5],
                        values[6]
                    )?;
                }
            }
            time += net.options.report_step;
        }
        Ok(())
    }
}
