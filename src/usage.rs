//! CPU time and peak memory of this process and its reaped children.

use std::time::Duration;

/// A `getrusage` sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceUsage {
    pub user: Duration,
    pub system: Duration,
    /// Peak resident set size in KiB.
    pub max_rss_kb: i64,
}

impl ResourceUsage {
    /// Usage of this process plus all children that have been waited for.
    ///
    /// Worker processes only show up here once the coordinator has reaped them.
    pub fn current() -> std::io::Result<Self> {
        let own = sample(Who::Process)?;
        let children = sample(Who::Children)?;
        Ok(Self {
            user: own.user + children.user,
            system: own.system + children.system,
            max_rss_kb: own.max_rss_kb.max(children.max_rss_kb),
        })
    }

    /// CPU time spent between `earlier` and `self`. The peak RSS is not a
    /// counter, so the later value is kept as is.
    pub fn since(&self, earlier: &ResourceUsage) -> ResourceUsage {
        ResourceUsage {
            user: self.user.saturating_sub(earlier.user),
            system: self.system.saturating_sub(earlier.system),
            max_rss_kb: self.max_rss_kb,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Who {
    Process,
    Children,
}

#[cfg(unix)]
fn sample(who: Who) -> std::io::Result<ResourceUsage> {
    let who = match who {
        Who::Process => libc::RUSAGE_SELF,
        Who::Children => libc::RUSAGE_CHILDREN,
    };

    let mut usage = std::mem::MaybeUninit::<libc::rusage>::zeroed();
    // SAFETY: `usage` is a valid, writable rusage and `who` is a supported target.
    let rc = unsafe { libc::getrusage(who, usage.as_mut_ptr()) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    // SAFETY: getrusage succeeded and filled the struct.
    let usage = unsafe { usage.assume_init() };

    Ok(ResourceUsage {
        user: timeval(usage.ru_utime),
        system: timeval(usage.ru_stime),
        max_rss_kb: max_rss_kb(usage.ru_maxrss as i64),
    })
}

#[cfg(not(unix))]
fn sample(_who: Who) -> std::io::Result<ResourceUsage> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "getrusage is not available on this platform",
    ))
}

#[cfg(unix)]
fn timeval(tv: libc::timeval) -> Duration {
    Duration::from_secs(tv.tv_sec.max(0) as u64) + Duration::from_micros(tv.tv_usec.max(0) as u64)
}

// macOS reports ru_maxrss in bytes, everyone else in KiB.
#[cfg(target_os = "macos")]
fn max_rss_kb(raw: i64) -> i64 {
    raw / 1024
}

#[cfg(not(target_os = "macos"))]
fn max_rss_kb(raw: i64) -> i64 {
    raw
}
