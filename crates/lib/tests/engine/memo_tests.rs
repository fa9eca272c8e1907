//! Memoization observed through a whole owner.

use std::sync::Arc;

use tokio::task::JoinSet;

use super::common::Pipeline;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_execution() {
  let pipeline = Arc::new(Pipeline::default());
  let mut tasks = JoinSet::new();
  for _ in 0..16 {
    let pipeline = Arc::clone(&pipeline);
    tasks.spawn(async move { pipeline.pack().await });
  }

  let mut results = Vec::new();
  while let Some(joined) = tasks.join_next().await {
    results.push(joined.unwrap().unwrap());
  }

  assert_eq!(results.len(), 16);
  assert!(results.iter().all(|path| path == &results[0]));
  assert_eq!(pipeline.ran(), vec!["Compile", "Link", "Pack"]);
}

#[tokio::test]
async fn independent_prerequisites_can_run_together() {
  let pipeline = Pipeline::default();
  let (unit, integration, link) = tokio::join!(
    pipeline.test("unit".to_string()),
    pipeline.test("integration".to_string()),
    pipeline.link()
  );
  unit.unwrap();
  integration.unwrap();
  link.unwrap();

  let ran = pipeline.ran();
  assert_eq!(ran.iter().filter(|step| *step == "Compile").count(), 1);
  assert_eq!(ran[0], "Compile");
  assert_eq!(ran.len(), 4);
}

#[tokio::test]
async fn failure_reaches_every_dependent() {
  let pipeline = Pipeline::failing_at("Compile");
  let (pack, test) = tokio::join!(pipeline.pack(), pipeline.test("unit".to_string()));

  let pack = pack.unwrap_err();
  let test = test.unwrap_err();
  assert_eq!(pack.root_cause().to_string(), "Compile exploded");
  assert_eq!(test.root_cause().to_string(), "Compile exploded");
  assert_eq!(
    pack.chain(),
    vec![
      "target Pack failed",
      "target Link failed",
      "target Compile failed",
      "Compile exploded"
    ]
  );

  // Replayed, not retried.
  let again = pipeline.compile().await.unwrap_err();
  assert_eq!(again.invocation(), "Compile");
  assert!(pipeline.ran().is_empty());
}

#[tokio::test]
async fn inputs_partition_invocations() {
  let pipeline = Pipeline::default();
  pipeline.test("unit".to_string()).await.unwrap();
  pipeline.test("integration".to_string()).await.unwrap();
  pipeline.test("unit".to_string()).await.unwrap();
  assert_eq!(pipeline.ran(), vec!["Compile", "Test unit", "Test integration"]);
}
