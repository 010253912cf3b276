//! `proc.num` and `proc.mem`
//!
//! Both checks select processes by name, owner and a command line regex,
//! then either count them or aggregate their memory.

use anyhow::anyhow;
use regex::Regex;
use sysinfo::{Process, ProcessRefreshKind, ProcessStatus, RefreshKind, System, Uid, Users};
use tracing::{instrument, trace};

use super::{Check, invalid_param, max_params, string_param};
use crate::agent::{AgentRequest, AgentResult, CheckStatus, ResultValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcState {
    All,
    Run,
    Sleep,
    Zombie,
    Disk,
    Trace,
}

impl ProcState {
    fn parse(state: Option<&str>) -> Option<Self> {
        match state {
            None | Some("all") => Some(ProcState::All),
            Some("run") => Some(ProcState::Run),
            Some("sleep") => Some(ProcState::Sleep),
            Some("zomb") => Some(ProcState::Zombie),
            Some("disk") => Some(ProcState::Disk),
            Some("trace") => Some(ProcState::Trace),
            Some(_) => None,
        }
    }

    fn matches(self, status: ProcessStatus) -> bool {
        match self {
            ProcState::All => true,
            ProcState::Run => matches!(status, ProcessStatus::Run),
            ProcState::Sleep => matches!(status, ProcessStatus::Sleep | ProcessStatus::Idle),
            ProcState::Zombie => matches!(status, ProcessStatus::Zombie),
            ProcState::Disk => matches!(status, ProcessStatus::UninterruptibleDiskSleep),
            ProcState::Trace => matches!(status, ProcessStatus::Stop | ProcessStatus::Tracing),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemMode {
    Sum,
    Avg,
    Max,
    Min,
}

impl MemMode {
    fn parse(mode: Option<&str>) -> Option<Self> {
        match mode {
            None | Some("sum") => Some(MemMode::Sum),
            Some("avg") => Some(MemMode::Avg),
            Some("max") => Some(MemMode::Max),
            Some("min") => Some(MemMode::Min),
            Some(_) => None,
        }
    }

    fn aggregate(self, values: &[u64]) -> ResultValue {
        match self {
            MemMode::Sum => ResultValue::Uint64(values.iter().sum()),
            MemMode::Avg if values.is_empty() => ResultValue::Double(0.0),
            MemMode::Avg => {
                ResultValue::Double(values.iter().sum::<u64>() as f64 / values.len() as f64)
            }
            MemMode::Max => ResultValue::Uint64(values.iter().copied().max().unwrap_or_default()),
            MemMode::Min => ResultValue::Uint64(values.iter().copied().min().unwrap_or_default()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemType {
    Vsize,
    Rss,
}

/// Selection shared by `proc.num` and `proc.mem`
#[derive(Debug)]
struct ProcessFilter {
    name: Option<String>,
    uid: Option<Uid>,
    cmdline: Option<Regex>,
}

impl ProcessFilter {
    /// Read name (0), user (1) and cmdline (3) from the request
    fn from_request(request: &AgentRequest) -> anyhow::Result<Self> {
        let name = string_param(request, 0)?.map(ToString::to_string);

        let uid = match string_param(request, 1)? {
            Some(user) => Some(lookup_uid(user)?),
            None => None,
        };

        let cmdline = string_param(request, 3)?
            .map(|pattern| Regex::new(pattern).map_err(|_| invalid_param(3)))
            .transpose()?;

        Ok(Self { name, uid, cmdline })
    }

    fn matches(&self, process: &Process) -> bool {
        if let Some(name) = &self.name
            && process.name().to_string_lossy() != name.as_str()
        {
            return false;
        }

        if let Some(uid) = &self.uid
            && process.user_id() != Some(uid)
        {
            return false;
        }

        if let Some(cmdline) = &self.cmdline {
            let command = process
                .cmd()
                .iter()
                .map(|arg| arg.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ");
            if !cmdline.is_match(&command) {
                return false;
            }
        }

        true
    }
}

fn lookup_uid(user: &str) -> anyhow::Result<Uid> {
    let users = Users::new_with_refreshed_list();
    users
        .list()
        .iter()
        .find(|candidate| candidate.name() == user)
        .map(|candidate| candidate.id().clone())
        .ok_or_else(|| anyhow!("Cannot obtain user information for \"{user}\"."))
}

/// Snapshot of the process table alone
fn process_snapshot() -> System {
    System::new_with_specifics(
        RefreshKind::nothing().with_processes(ProcessRefreshKind::everything()),
    )
}

/// `proc.num[name,user,state,cmdline]`
#[derive(Debug, Clone, Copy)]
pub struct ProcNum;

impl Check for ProcNum {
    #[instrument(name = "proc_num", skip_all)]
    fn run(&self, request: &AgentRequest, result: &mut AgentResult) -> CheckStatus {
        result.complete(proc_num(request))
    }
}

fn proc_num(request: &AgentRequest) -> anyhow::Result<ResultValue> {
    max_params(request, 4)?;

    let filter = ProcessFilter::from_request(request)?;
    let state = ProcState::parse(string_param(request, 2)?).ok_or_else(|| invalid_param(2))?;

    let system = process_snapshot();
    let count = system
        .processes()
        .values()
        .filter(|process| filter.matches(process) && state.matches(process.status()))
        .count();
    trace!("{count} matching processes");

    Ok(ResultValue::Uint64(count as u64))
}

/// `proc.mem[name,user,mode,cmdline,memtype]`
#[derive(Debug, Clone, Copy)]
pub struct ProcMem;

impl Check for ProcMem {
    #[instrument(name = "proc_mem", skip_all)]
    fn run(&self, request: &AgentRequest, result: &mut AgentResult) -> CheckStatus {
        result.complete(proc_mem(request))
    }
}

fn proc_mem(request: &AgentRequest) -> anyhow::Result<ResultValue> {
    max_params(request, 5)?;

    let filter = ProcessFilter::from_request(request)?;
    let mode = MemMode::parse(string_param(request, 2)?).ok_or_else(|| invalid_param(2))?;
    let mem_type = match string_param(request, 4)? {
        None | Some("vsize") => MemType::Vsize,
        Some("rss") => MemType::Rss,
        Some(_) => return Err(invalid_param(4)),
    };

    let system = process_snapshot();
    let values = system
        .processes()
        .values()
        .filter(|process| filter.matches(process))
        .map(|process| match mem_type {
            MemType::Vsize => process.virtual_memory(),
            MemType::Rss => process.memory(),
        })
        .collect::<Vec<_>>();
    trace!("{} matching processes", values.len());

    Ok(mode.aggregate(&values))
}
