//! Batch queue selection
//!
//! An execution system owns an ordered list of queues, conventionally in ascending order of
//! limits. A request either names a queue and is validated against it alone, or is matched
//! against each queue in stored order and lands in the first one that fits.

use log::{debug, info, warn};

use crate::error::Rejection;
use crate::queue::resource::ResourceRequest;
use crate::system::{BatchQueue, ExecutionSystem, RunTime, UNLIMITED, UNLIMITED_MEMORY};

/// Parse requested resources and back-fill them from application defaults
pub mod resource;

fn count_fits(requested: Option<i64>, limit: i64) -> bool {
    match requested {
        None => false,
        Some(UNLIMITED) => true,
        Some(n) => n > 0 && (limit == UNLIMITED || n <= limit),
    }
}

pub(crate) fn is_unlimited_memory(memory: f64) -> bool {
    (memory - UNLIMITED_MEMORY).abs() < f64::EPSILON
}

fn memory_fits(requested: Option<f64>, limit: f64) -> bool {
    match requested {
        None => false,
        Some(m) if is_unlimited_memory(m) => true,
        Some(m) => m > 0.0 && (is_unlimited_memory(limit) || m <= limit),
    }
}

fn time_fits(requested: Option<RunTime>, limit: &RunTime) -> bool {
    match requested {
        None => false,
        Some(RunTime::Unbounded) => true,
        Some(time) => !time.is_zero() && time.fits_within(limit),
    }
}

/// Check a request against one queue's limits
///
/// Every dimension must be given. The unlimited sentinel is always legal, otherwise a value
/// must be positive and no greater than the queue's limit. A queue limit of -1 accepts any
/// positive value.
pub fn validate(
    queue: &BatchQueue,
    nodes: Option<i64>,
    processors: Option<i64>,
    memory: Option<f64>,
    time: Option<RunTime>,
) -> bool {
    count_fits(nodes, queue.max_nodes)
        && count_fits(processors, queue.max_processors_per_node)
        && memory_fits(memory, queue.max_memory_per_node)
        && time_fits(time, &queue.max_requested_time)
}

fn fits(queue: &BatchQueue, request: &ResourceRequest) -> bool {
    validate(
        queue,
        Some(request.node_count),
        Some(request.processors_per_node),
        Some(request.memory_per_node),
        Some(request.max_run_time),
    )
}

/// First queue, in stored order, that accommodates nodes, memory and time
///
/// Processors are not a search criterion.
pub fn search<'a>(system: &'a ExecutionSystem, request: &ResourceRequest) -> Option<&'a BatchQueue> {
    info!("Searching {} queues on {} for {request}", system.queues.len(), system.id);
    system.queues.iter().find(|queue| {
        let fits = validate(
            queue,
            Some(request.node_count),
            Some(UNLIMITED),
            Some(request.memory_per_node),
            Some(request.max_run_time),
        );
        debug!("Queue {} fits: {fits}", queue.name);
        fits
    })
}

/// Resolve the batch queue for a fully back-filled resource request
///
/// A named queue is validated on its own. Without a name the queue comes from [search]. Either
/// way the resolved queue must accommodate the whole request, processors included.
pub fn select<'a>(
    system: &'a ExecutionSystem,
    request: &ResourceRequest,
    named: Option<&str>,
) -> Result<&'a BatchQueue, Rejection> {
    let queue = match named {
        Some(name) => {
            info!("Validating request against named queue {name} on {}", system.id);
            system.queue(name).ok_or_else(|| {
                Rejection::no_match(format!(
                    "Invalid batchQueue. No batch queue named {name} is defined on system {}",
                    system.id
                ))
            })?
        }
        None => search(system, request).ok_or_else(|| {
            Rejection::no_match(format!(
                "No batch queue on system {} can accommodate {request}",
                system.id
            ))
        })?,
    };

    if fits(queue, request) {
        Ok(queue)
    } else {
        warn!("Request {request} does not fit queue {}", queue.name);
        Err(Rejection::no_match(format!(
            "Invalid batchQueue. The requested resources {request} exceed the limits of queue {}",
            queue.name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RejectionKind;

    fn queue(name: &str, max_nodes: i64) -> BatchQueue {
        BatchQueue {
            name: name.to_string(),
            max_nodes,
            max_processors_per_node: UNLIMITED,
            max_memory_per_node: UNLIMITED_MEMORY,
            max_requested_time: RunTime::Unbounded,
            is_system_default: false,
        }
    }

    fn system(queues: Vec<BatchQueue>) -> ExecutionSystem {
        ExecutionSystem { id: "hpc".to_string(), queues, scratch_dir: None, work_dir: None }
    }

    fn request(nodes: i64) -> ResourceRequest {
        ResourceRequest {
            node_count: nodes,
            processors_per_node: 1,
            memory_per_node: 1.0,
            max_run_time: RunTime::from_secs(3600),
        }
    }

    fn hour() -> Option<RunTime> {
        Some(RunTime::from_secs(3600))
    }

    #[test]
    fn test_inclusive_node_boundary() {
        let q = queue("small", 2);
        assert!(validate(&q, Some(2), Some(1), Some(1.0), hour()));
        assert!(!validate(&q, Some(3), Some(1), Some(1.0), hour()));
    }

    #[test]
    fn test_every_dimension_is_mandatory() {
        let q = queue("open", UNLIMITED);
        assert!(validate(&q, Some(1), Some(1), Some(1.0), hour()));
        assert!(!validate(&q, None, Some(1), Some(1.0), hour()));
        assert!(!validate(&q, Some(1), None, Some(1.0), hour()));
        assert!(!validate(&q, Some(1), Some(1), None, hour()));
        assert!(!validate(&q, Some(1), Some(1), Some(1.0), None));
    }

    #[test]
    fn test_sentinels_and_non_positive_values() {
        let mut q = queue("small", 2);
        q.max_processors_per_node = 4;
        q.max_memory_per_node = 8.0;
        q.max_requested_time = RunTime::from_secs(7200);

        assert!(validate(&q, Some(UNLIMITED), Some(UNLIMITED), Some(UNLIMITED_MEMORY), Some(RunTime::Unbounded)));
        assert!(!validate(&q, Some(0), Some(1), Some(1.0), hour()));
        assert!(!validate(&q, Some(1), Some(-2), Some(1.0), hour()));
        assert!(!validate(&q, Some(1), Some(1), Some(0.0), hour()));
        assert!(!validate(&q, Some(1), Some(1), Some(8.5), hour()));
        assert!(!validate(&q, Some(1), Some(5), Some(1.0), hour()));
        assert!(!validate(&q, Some(1), Some(1), Some(1.0), Some(RunTime::from_secs(0))));
        assert!(!validate(&q, Some(1), Some(1), Some(1.0), Some(RunTime::from_secs(7201))));
    }

    #[test]
    fn test_zero_time_rejected_on_unbounded_queue() {
        let q = queue("open", UNLIMITED);
        assert!(!validate(&q, Some(1), Some(1), Some(1.0), Some(RunTime::from_secs(0))));
    }

    #[test]
    fn test_select_first_accommodating_queue() {
        let system = system(vec![
            queue("q1", 1),
            queue("q2", 2),
            queue("q10", 10),
            queue("q100", 100),
            queue("qUnbounded", UNLIMITED),
        ]);

        assert_eq!(select(&system, &request(101), None).unwrap().name, "qUnbounded");
        assert_eq!(select(&system, &request(100), None).unwrap().name, "q100");
        assert_eq!(select(&system, &request(3), None).unwrap().name, "q10");
        assert_eq!(select(&system, &request(1), None).unwrap().name, "q1");
    }

    #[test]
    fn test_select_is_deterministic_over_order() {
        let system = system(vec![queue("b", 10), queue("a", 10)]);
        for _ in 0..3 {
            assert_eq!(select(&system, &request(5), None).unwrap().name, "b");
        }
    }

    #[test]
    fn test_search_ignores_processors() {
        let mut narrow = queue("narrow", 10);
        narrow.max_processors_per_node = 1;
        let system = system(vec![narrow, queue("wide", 10)]);

        let mut wide = request(1);
        wide.processors_per_node = 64;
        assert_eq!(search(&system, &wide).unwrap().name, "narrow");
    }

    #[test]
    fn test_searched_queue_must_fit_processors() {
        let mut narrow = queue("narrow", 10);
        narrow.max_processors_per_node = 4;
        let system = system(vec![narrow]);

        let mut wide = request(1);
        wide.processors_per_node = 64;
        let err = select(&system, &wide, None).unwrap_err();
        assert_eq!(err.kind(), RejectionKind::NoMatch);
        let err = select(&system, &wide, Some("narrow")).unwrap_err();
        assert_eq!(err.kind(), RejectionKind::NoMatch);

        wide.processors_per_node = 4;
        assert_eq!(select(&system, &wide, None).unwrap().name, "narrow");
    }

    #[test]
    fn test_select_no_match() {
        let system = system(vec![queue("q1", 1), queue("q2", 2)]);
        let err = select(&system, &request(3), None).unwrap_err();
        assert_eq!(err.kind(), RejectionKind::NoMatch);

        let empty = self::system(vec![]);
        assert!(select(&empty, &request(1), None).is_err());
    }

    #[test]
    fn test_named_queue_validated_alone() {
        let system = system(vec![queue("q1", 1), queue("q10", 10)]);

        assert_eq!(select(&system, &request(1), Some("q10")).unwrap().name, "q10");
        let err = select(&system, &request(2), Some("q1")).unwrap_err();
        assert_eq!(err.kind(), RejectionKind::NoMatch);
        let err = select(&system, &request(1), Some("missing")).unwrap_err();
        assert_eq!(err.kind(), RejectionKind::NoMatch);
    }
}
