// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;

use logtree::Error;
use logtree::Level;
use logtree::Record;
use logtree::Repository;
use logtree::append::Append;
use logtree::append::MemoryAppender;
use logtree::diagnostic::ThreadContext;
use logtree::trap::BufferTrap;

#[derive(Debug)]
struct AlwaysFailing;

impl Append for AlwaysFailing {
    fn name(&self) -> &str {
        "always-failing"
    }

    fn append(&self, _record: &Record) -> Result<(), Error> {
        Err(Error::new("sink unavailable"))
    }
}

#[test]
fn test_levels_below_effective_produce_no_side_effects() {
    let repo = Repository::new();
    repo.root().set_level(Some(Level::INFO));
    let sink = Arc::new(MemoryAppender::new("sink"));
    repo.root().add_appender(sink.clone());

    let logger = repo.logger("a.b");
    logger.debug("filtered out");
    assert!(sink.is_empty());

    logger.info("dispatched");
    let records = sink.drain();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].payload(), "dispatched");
    assert_eq!(records[0].logger(), "a.b");
}

#[test]
fn test_additive_chain_reaches_every_ancestor_appender() {
    let repo = Repository::new();
    let at_root = Arc::new(MemoryAppender::new("at-root"));
    let at_mid = Arc::new(MemoryAppender::new("at-mid"));
    let at_leaf = Arc::new(MemoryAppender::new("at-leaf"));
    repo.root().add_appender(at_root.clone());
    repo.logger("svc").add_appender(at_mid.clone());
    repo.logger("svc.worker").add_appender(at_leaf.clone());

    repo.logger("svc.worker").info("tick");
    assert_eq!(at_leaf.len(), 1);
    assert_eq!(at_mid.len(), 1);
    assert_eq!(at_root.len(), 1);
}

#[test]
fn test_non_additive_logger_stops_the_climb() {
    let repo = Repository::new();
    let at_root = Arc::new(MemoryAppender::new("at-root"));
    let at_mid = Arc::new(MemoryAppender::new("at-mid"));
    repo.root().add_appender(at_root.clone());

    let mid = repo.logger("svc");
    mid.add_appender(at_mid.clone());
    mid.set_additive(false);

    repo.logger("svc.worker").info("tick");
    assert_eq!(at_mid.len(), 1);
    assert!(at_root.is_empty());
}

#[test]
fn test_failing_appender_never_blocks_its_siblings() {
    let repo = Repository::new();
    let trap = BufferTrap::new();
    repo.set_trap(trap.clone());

    let logger = repo.logger("svc");
    logger.add_appender(Arc::new(AlwaysFailing));
    let healthy = Arc::new(MemoryAppender::new("healthy"));
    logger.add_appender(healthy.clone());

    for i in 0..5 {
        logger.info(format!("event {i}"));
    }

    assert_eq!(healthy.len(), 5);
    let reported = trap.drain();
    assert_eq!(reported.len(), 5);
    assert!(reported[0].contains("always-failing"));
}

#[test]
fn test_property_scopes_override_in_order() {
    let repo = Repository::new();
    repo.set_property("service", "billing");
    repo.set_property("region", "eu-1");
    let sink = Arc::new(MemoryAppender::new("sink"));
    repo.root().add_appender(sink.clone());

    ThreadContext::put("region", "eu-2");
    let logger = repo.logger("svc");
    logger.log_record(
        Record::builder(Level::INFO, "scoped")
            .property("request", logtree::kv::str_value("r-1"))
            .property("region", logtree::kv::str_value("eu-3"))
            .build(),
    );
    ThreadContext::remove("region");

    let records = sink.drain();
    let properties = records[0].properties();
    assert_eq!(properties.get("service").unwrap().to_string(), "billing");
    assert_eq!(properties.get("region").unwrap().to_string(), "eu-3");
    assert_eq!(properties.get("request").unwrap().to_string(), "r-1");
}

#[test]
fn test_context_stack_is_captured_at_emission() {
    let repo = Repository::new();
    let sink = Arc::new(MemoryAppender::new("sink"));
    repo.root().add_appender(sink.clone());
    let logger = repo.logger("svc");

    {
        let _request = ThreadContext::push("request 7");
        let _phase = ThreadContext::push("checkout");
        logger.info("inside");
    }
    logger.info("outside");

    let records = sink.drain();
    let frames: Vec<&str> = records[0].context().iter().map(String::as_str).collect();
    assert_eq!(frames, vec!["request 7", "checkout"]);
    assert!(records[1].context().is_empty());
}

#[test]
fn test_shared_appender_fans_in_from_many_loggers() {
    let repo = Repository::new();
    let shared = Arc::new(MemoryAppender::new("shared"));
    repo.logger("api").add_appender(shared.clone());
    repo.logger("jobs").add_appender(shared.clone());

    repo.logger("api").info("from api");
    repo.logger("jobs").info("from jobs");

    let origins: Vec<String> = shared
        .drain()
        .iter()
        .map(|r| r.logger().to_string())
        .collect();
    assert_eq!(origins, vec!["api", "jobs"]);
}
