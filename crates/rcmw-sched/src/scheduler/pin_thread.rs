// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! OS-level thread placement: CPU affinity and scheduling policy.
//!
//! Linux only; other platforms get stubs returning [`Error::Unsupported`]
//! (empty requests are still accepted everywhere).

use crate::error::{Error, Result};

/// Native thread handle accepted by the setters.
pub type ThreadHandle = libc::pthread_t;

/// Parse a cpuset like `"0-3,8,10-11"` into CPU indices, in order.
///
/// An empty string yields an empty set.
pub fn parse_cpuset(spec: &str) -> Result<Vec<usize>> {
    let invalid = || Error::InvalidCpuset(spec.to_string());
    let mut cpus = Vec::new();
    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((first, last)) => {
                let first: usize = first.trim().parse().map_err(|_| invalid())?;
                let last: usize = last.trim().parse().map_err(|_| invalid())?;
                if first > last {
                    return Err(invalid());
                }
                cpus.extend(first..=last);
            }
            None => cpus.push(part.parse().map_err(|_| invalid())?),
        }
    }
    Ok(cpus)
}

/// Kernel thread id of the calling thread.
pub fn current_tid() -> i32 {
    #[cfg(target_os = "linux")]
    {
        // SAFETY: gettid has no preconditions.
        unsafe { libc::syscall(libc::SYS_gettid) as i32 }
    }
    #[cfg(not(target_os = "linux"))]
    {
        std::process::id() as i32
    }
}

/// Pin `thread` according to `affinity`:
/// - `range`: the whole of `cpus`
/// - `1to1`: only `cpus[cpu_index]`
///
/// An empty `cpus` leaves the thread untouched.
pub fn set_sched_affinity(
    thread: ThreadHandle,
    cpus: &[usize],
    affinity: &str,
    cpu_index: usize,
) -> Result<()> {
    if cpus.is_empty() {
        return Ok(());
    }
    match affinity {
        "range" => apply_affinity(thread, cpus),
        "1to1" => match cpus.get(cpu_index) {
            Some(cpu) => apply_affinity(thread, std::slice::from_ref(cpu)),
            None => Err(Error::AffinityFailed(format!(
                "processor {} has no cpu in a set of {}",
                cpu_index,
                cpus.len()
            ))),
        },
        other => Err(Error::AffinityFailed(format!(
            "unknown affinity mode {:?}",
            other
        ))),
    }
}

/// Pin the calling thread to `cpus`. An empty set is a no-op.
pub fn set_current_thread_affinity(cpus: &[usize]) -> Result<()> {
    if cpus.is_empty() {
        return Ok(());
    }
    // SAFETY: pthread_self has no preconditions.
    apply_affinity(unsafe { libc::pthread_self() }, cpus)
}

/// Apply an OS scheduling policy:
/// - `SCHED_FIFO` / `SCHED_RR`: real-time `priority` on `thread`
/// - `SCHED_OTHER`: nice value `priority` on kernel thread `tid`
///
/// An empty policy is a no-op.
pub fn set_sched_policy(
    thread: ThreadHandle,
    policy: &str,
    priority: i32,
    tid: Option<i32>,
) -> Result<()> {
    match policy {
        "" => Ok(()),
        "SCHED_FIFO" => apply_realtime(thread, RealtimePolicy::Fifo, priority),
        "SCHED_RR" => apply_realtime(thread, RealtimePolicy::RoundRobin, priority),
        "SCHED_OTHER" => match tid {
            Some(tid) => apply_nice(tid, priority),
            None => {
                log::debug!("[pin-thread] SCHED_OTHER without a tid, nice value skipped");
                Ok(())
            }
        },
        other => Err(Error::SchedPolicyFailed(format!(
            "unknown policy {:?}",
            other
        ))),
    }
}

#[derive(Clone, Copy)]
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
enum RealtimePolicy {
    Fifo,
    RoundRobin,
}

#[cfg(target_os = "linux")]
fn apply_affinity(thread: ThreadHandle, cpus: &[usize]) -> Result<()> {
    let max = libc::CPU_SETSIZE as usize;
    if let Some(cpu) = cpus.iter().find(|&&cpu| cpu >= max) {
        return Err(Error::AffinityFailed(format!(
            "cpu {} exceeds CPU_SETSIZE {}",
            cpu, max
        )));
    }

    // SAFETY: cpu_set_t is plain data, every index was checked against
    // CPU_SETSIZE above.
    let result = unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        for &cpu in cpus {
            libc::CPU_SET(cpu, &mut set);
        }
        libc::pthread_setaffinity_np(thread, std::mem::size_of::<libc::cpu_set_t>(), &set)
    };

    if result == 0 {
        Ok(())
    } else {
        Err(Error::AffinityFailed(format!(
            "pthread_setaffinity_np({:?}): {}",
            cpus,
            std::io::Error::from_raw_os_error(result)
        )))
    }
}

#[cfg(target_os = "linux")]
fn apply_realtime(thread: ThreadHandle, policy: RealtimePolicy, priority: i32) -> Result<()> {
    let policy = match policy {
        RealtimePolicy::Fifo => libc::SCHED_FIFO,
        RealtimePolicy::RoundRobin => libc::SCHED_RR,
    };
    // SAFETY: sched_param is plain data and outlives the call.
    let result = unsafe {
        let mut param: libc::sched_param = std::mem::zeroed();
        param.sched_priority = priority;
        libc::pthread_setschedparam(thread, policy, &param)
    };

    if result == 0 {
        Ok(())
    } else {
        Err(Error::SchedPolicyFailed(format!(
            "pthread_setschedparam(prio {}): {}",
            priority,
            std::io::Error::from_raw_os_error(result)
        )))
    }
}

#[cfg(target_os = "linux")]
fn apply_nice(tid: i32, nice: i32) -> Result<()> {
    // SAFETY: setpriority only reads its scalar arguments.
    let result = unsafe { libc::setpriority(libc::PRIO_PROCESS, tid as libc::id_t, nice) };
    if result == 0 {
        Ok(())
    } else {
        Err(Error::SchedPolicyFailed(format!(
            "setpriority(tid {}, nice {}): {}",
            tid,
            nice,
            std::io::Error::last_os_error()
        )))
    }
}

#[cfg(not(target_os = "linux"))]
fn apply_affinity(_thread: ThreadHandle, _cpus: &[usize]) -> Result<()> {
    Err(Error::Unsupported)
}

#[cfg(not(target_os = "linux"))]
fn apply_realtime(_thread: ThreadHandle, _policy: RealtimePolicy, _priority: i32) -> Result<()> {
    Err(Error::Unsupported)
}

#[cfg(not(target_os = "linux"))]
fn apply_nice(_tid: i32, _nice: i32) -> Result<()> {
    Err(Error::Unsupported)
}
