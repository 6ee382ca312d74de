mod topology;

pub use topology::numa_topology;

use crate::counters::{CounterKind, CounterSnapshot, CounterSource, RefreshCache};
use crate::Error;
use regex::Regex;
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::mem;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use windows::core::HSTRING;
use windows::Win32::Foundation;
use windows::Win32::System::Performance;

const SNAPSHOT_TTL: Duration = Duration::from_millis(300);

/// Raw tick counters read through PDH.
///
/// Legacy mode reads the five per-core time counters from the `Processor`
/// object; utility mode reads the same categories plus the throttling-aware
/// utility counters from `Processor Information`, whose instances are
/// `"<node>,<ordinal>"` pairs on NUMA hosts. Counter paths are added by their
/// English names so the query works on localized systems.
pub struct Pdh {
    inner: Mutex<PdhInner>,
    instance_re: Regex,
    cache: RefreshCache<CounterSnapshot>,
}

struct PdhInner {
    query: PdhHandle,
    counters: Vec<(CounterKind, isize)>,
    utility: bool,
}

struct PdhHandle(isize);

impl Drop for PdhHandle {
    fn drop(&mut self) {
        unsafe {
            let _r = Performance::PdhCloseQuery(self.0);
            debug_assert_eq!(Foundation::WIN32_ERROR(_r as _), Foundation::ERROR_SUCCESS);
        }
    }
}

impl Pdh {
    pub fn new(use_utility: bool) -> Result<Self, Error> {
        if use_utility {
            match Self::open(true) {
                Ok(pdh) => return Ok(pdh),
                Err(err) => {
                    log::warn!("Utility counters unavailable ({}), using legacy only", err)
                }
            }
        }

        Self::open(false)
    }

    fn open(utility: bool) -> Result<Self, Error> {
        unsafe {
            let mut query = 0;
            let mut r =
                Foundation::WIN32_ERROR(Performance::PdhOpenQueryW(None, 0, &mut query) as _);
            if r != Foundation::ERROR_SUCCESS {
                return Err(Error::Pdh(r));
            }
            let query = PdhHandle(query);

            let object = if utility {
                "Processor Information"
            } else {
                "Processor"
            };
            let mut paths = vec![
                (CounterKind::PercentPrivilegedTime, "% Privileged Time"),
                (CounterKind::PercentUserTime, "% User Time"),
                (CounterKind::PercentInterruptTime, "% Interrupt Time"),
                (CounterKind::PercentDpcTime, "% DPC Time"),
                (CounterKind::PercentProcessorTime, "% Processor Time"),
            ];
            if utility {
                paths.push((CounterKind::PercentPrivilegedUtility, "% Privileged Utility"));
                paths.push((CounterKind::PercentProcessorUtility, "% Processor Utility"));
            }

            let mut counters = vec![];
            for (kind, name) in paths {
                let mut counter = 0;
                r = Foundation::WIN32_ERROR(Performance::PdhAddEnglishCounterW(
                    query.0,
                    &HSTRING::from(format!("\\{}(*)\\{}", object, name)),
                    0,
                    &mut counter,
                ) as _);
                if r != Foundation::ERROR_SUCCESS {
                    return Err(Error::Pdh(r));
                }
                counters.push((kind, counter));
            }

            // Prime the query so the first snapshot already carries data.
            r = Foundation::WIN32_ERROR(Performance::PdhCollectQueryData(query.0) as _);
            if r != Foundation::ERROR_SUCCESS {
                return Err(Error::Pdh(r));
            }

            Ok(Self {
                inner: Mutex::new(PdhInner {
                    query,
                    counters,
                    utility,
                }),
                instance_re: Regex::new(r"^\d+(,\d+)?$").unwrap(),
                cache: RefreshCache::new(SNAPSHOT_TTL),
            })
        }
    }

    fn collect(&self) -> Result<CounterSnapshot, Error> {
        let inner = self.inner.lock().unwrap();

        unsafe {
            let mut timestamp = 0i64;
            let r = Foundation::WIN32_ERROR(Performance::PdhCollectQueryDataWithTime(
                inner.query.0,
                &mut timestamp,
            ) as _);
            if r != Foundation::ERROR_SUCCESS {
                return Err(Error::Pdh(r));
            }

            let mut instances: Vec<String> = vec![];
            let mut values: HashMap<CounterKind, Vec<u64>> = HashMap::new();

            for &(kind, counter) in inner.counters.iter() {
                let mut firsts = vec![];
                let mut seconds = vec![];
                let mut names = vec![];

                for (name, first, second) in read_raw_array(counter)? {
                    // Drop aggregate rows ("_Total", "0,_Total") at the
                    // source; only plain and node,ordinal instances remain.
                    if !self.instance_re.is_match(&name) {
                        continue;
                    }
                    names.push(name);
                    firsts.push(first.max(0) as u64);
                    seconds.push(second.max(0) as u64);
                }

                if instances.is_empty() {
                    instances = names;
                }
                if kind == CounterKind::PercentProcessorUtility {
                    // The wrapping base counter rides along as the raw
                    // counter's second value.
                    values.insert(CounterKind::PercentProcessorUtilityBase, seconds);
                }
                values.insert(kind, firsts);
            }

            if inner.utility {
                values.insert(
                    CounterKind::TimestampSys100Ns,
                    vec![timestamp.max(0) as u64; instances.len()],
                );
            }

            Ok(CounterSnapshot::new(instances, values))
        }
    }
}

impl CounterSource for Pdh {
    fn snapshot(&self) -> Result<CounterSnapshot, Error> {
        self.cache.get_or_refresh(Instant::now(), || self.collect())
    }
}

unsafe fn read_raw_array(counter: isize) -> Result<Vec<(String, i64, i64)>, Error> {
    let mut buffer_size = 0;
    let mut item_count = 0;

    let mut r = Performance::PdhGetRawCounterArrayW(
        counter,
        &mut buffer_size,
        &mut item_count,
        None,
    );

    if r == Performance::PDH_NO_DATA {
        return Ok(vec![]);
    }

    if r != Performance::PDH_MORE_DATA {
        return Err(Error::Pdh(Foundation::WIN32_ERROR(r as _)));
    }

    let mut buffer: Vec<Performance::PDH_RAW_COUNTER_ITEM_W> = Vec::with_capacity(
        buffer_size as usize / mem::size_of::<Performance::PDH_RAW_COUNTER_ITEM_W>() + 1,
    );
    buffer.set_len(item_count as _);

    r = Performance::PdhGetRawCounterArrayW(
        counter,
        &mut buffer_size,
        &mut item_count,
        Some(buffer.as_mut_ptr()),
    );

    if r == Performance::PDH_NO_DATA {
        return Ok(vec![]);
    }

    if Foundation::WIN32_ERROR(r as _) != Foundation::ERROR_SUCCESS {
        return Err(Error::Pdh(Foundation::WIN32_ERROR(r as _)));
    }

    let mut items = vec![];
    for i in 0..item_count {
        let item = &buffer[i as usize];
        let name = match item.szName.to_string() {
            Ok(name) => name,
            Err(_) => continue,
        };
        items.push((name, item.RawValue.FirstValue, item.RawValue.SecondValue));
    }

    Ok(items)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessorInfo {
    pub percent_processor_performance: f32,
    pub processor_frequency: f32,
}

/// Per-core effective frequency from the formatted WMI counters.
pub fn cpu_frequency() -> Result<Vec<f32>, Error> {
    let wmi_conn = wmi::WMIConnection::new(get_com_lib().ok_or(Error::ComLib)?)?;
    let processor_info: Vec<ProcessorInfo> = wmi_conn.raw_query(
        "SELECT Name, PercentProcessorPerformance, ProcessorFrequency FROM Win32_PerfFormattedData_Counters_ProcessorInformation WHERE NOT Name LIKE '%_Total'",
    )?;
    Ok(processor_info
        .into_iter()
        .map(|p| p.processor_frequency * p.percent_processor_performance / 100.0)
        .collect())
}

thread_local! {
    static COM_LIB: RefCell<Option<wmi::COMLibrary>> = RefCell::new(None);
}

pub fn get_com_lib() -> Option<wmi::COMLibrary> {
    COM_LIB.with(|com| {
        let mut com_ref = com.borrow_mut();
        if com_ref.is_none() {
            *com_ref = wmi::COMLibrary::new().ok();
        }
        *com_ref
    })
}
