//! Blob queue operators

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::OpHarness;
use hipops::{BlobsQueue, OperatorDef, OpsError, Tensor};

fn create_queue(h: &mut OpHarness, capacity: i64, num_blobs: i64) {
    let def = OperatorDef::new("CreateBlobsQueue", &[], &["queue"])
        .with_arg("capacity", capacity)
        .with_arg("num_blobs", num_blobs);
    h.run(&def).unwrap();
}

#[test]
fn test_create_uses_output_name() {
    let mut h = OpHarness::shared();
    let def = OperatorDef::new("CreateBlobsQueue", &[], &["q"])
        .with_arg("capacity", 4)
        .with_arg("num_blobs", 2)
        .with_arg("field_names", vec!["ids", "scores"]);
    h.run(&def).unwrap();

    let queue = h.ws.fetch_queue("q").unwrap();
    assert_eq!(queue.name(), "q");
    assert_eq!(queue.capacity(), 4);
    assert_eq!(queue.num_blobs(), 2);
    assert_eq!(queue.field_names(), &["ids".to_string(), "scores".to_string()]);
    assert!(queue.is_empty());
}

#[test]
fn test_enqueue_dequeue_round_trip() {
    let mut h = OpHarness::shared();
    create_queue(&mut h, 2, 2);
    h.feed_vec("a", &[2], vec![1.0f32, 2.0]);
    h.feed_vec("b", &[1], vec![7i32]);
    h.run(&OperatorDef::new("EnqueueBlobs", &["queue", "a", "b"], &["a", "b"]))
        .unwrap();
    assert_eq!(h.ws.fetch_queue("queue").unwrap().len(), 1);

    h.run(&OperatorDef::new("DequeueBlobs", &["queue"], &["x", "y"]))
        .unwrap();
    assert_eq!(h.fetch_vec::<f32>("x"), vec![1.0, 2.0]);
    assert_eq!(h.fetch_vec::<i32>("y"), vec![7]);
    assert!(h.ws.fetch_queue("queue").unwrap().is_empty());
}

#[test]
fn test_enqueue_stores_a_snapshot() {
    let mut h = OpHarness::shared();
    create_queue(&mut h, 1, 1);
    h.feed_vec("X", &[2], vec![1.0f32, 2.0]);
    h.run(&OperatorDef::new("Sqr", &["X"], &["Y"])).unwrap();
    h.run(&OperatorDef::new("EnqueueBlobs", &["queue", "Y"], &["Y"]))
        .unwrap();

    // Overwrite Y after enqueueing; the queued copy is unaffected
    h.run(&OperatorDef::new("Sqr", &["Y"], &["Y"])).unwrap();
    assert_eq!(h.fetch_vec::<f32>("Y"), vec![1.0, 16.0]);

    h.run(&OperatorDef::new("DequeueBlobs", &["queue"], &["out"]))
        .unwrap();
    assert_eq!(h.fetch_vec::<f32>("out"), vec![1.0, 4.0]);
}

#[test]
fn test_enqueue_arity_checked_at_construction() {
    let mut h = OpHarness::shared();
    create_queue(&mut h, 1, 1);
    h.feed_vec("a", &[1], vec![1.0f32]);
    let err = h
        .create(&OperatorDef::new("EnqueueBlobs", &["queue", "a"], &["a", "b"]))
        .err()
        .unwrap();
    assert!(matches!(err, OpsError::InvalidArgument(_)));
}

#[test]
fn test_dequeue_after_close_fails() {
    let mut h = OpHarness::shared();
    create_queue(&mut h, 1, 1);
    h.run(&OperatorDef::new("CloseBlobsQueue", &["queue"], &[]))
        .unwrap();
    let err = h
        .run(&OperatorDef::new("DequeueBlobs", &["queue"], &["out"]))
        .unwrap_err();
    assert!(matches!(err, OpsError::QueueClosed(_)));
}

#[test]
fn test_dequeue_timeout() {
    let mut h = OpHarness::shared();
    create_queue(&mut h, 1, 1);
    let def = OperatorDef::new("DequeueBlobs", &["queue"], &["out"]).with_arg("timeout_secs", 0.05);
    let err = h.run(&def).unwrap_err();
    assert!(matches!(err, OpsError::QueueTimeout(_)));
}

#[test]
fn test_safe_enqueue_reports_closed_queue() {
    let mut h = OpHarness::shared();
    create_queue(&mut h, 2, 1);
    h.feed_vec("a", &[1], vec![3.0f32]);
    let enqueue = OperatorDef::new("SafeEnqueueBlobs", &["queue", "a"], &["a", "status"]);

    h.run(&enqueue).unwrap();
    assert_eq!(h.fetch_vec::<bool>("status"), vec![false]);

    h.run(&OperatorDef::new("CloseBlobsQueue", &["queue"], &[]))
        .unwrap();
    h.run(&enqueue).unwrap();
    let status = h.fetch("status");
    assert_eq!(status.ndim(), 0);
    assert_eq!(status.to_vec::<bool>().unwrap(), vec![true]);
}

#[test]
fn test_safe_dequeue_drains_then_reports() {
    let mut h = OpHarness::shared();
    create_queue(&mut h, 2, 1);
    h.feed_vec("a", &[1], vec![5i64]);
    h.run(&OperatorDef::new("EnqueueBlobs", &["queue", "a"], &["a"]))
        .unwrap();
    h.run(&OperatorDef::new("CloseBlobsQueue", &["queue"], &[]))
        .unwrap();

    let dequeue = OperatorDef::new("SafeDequeueBlobs", &["queue"], &["out", "status"]);
    h.run(&dequeue).unwrap();
    assert_eq!(h.fetch_vec::<i64>("out"), vec![5]);
    assert_eq!(h.fetch_vec::<bool>("status"), vec![false]);

    h.run(&dequeue).unwrap();
    assert_eq!(h.fetch_vec::<bool>("status"), vec![true]);
    // The previous output is left in place
    assert_eq!(h.fetch_vec::<i64>("out"), vec![5]);
}

#[test]
fn test_safe_dequeue_concatenates_records() {
    let mut h = OpHarness::shared();
    create_queue(&mut h, 4, 1);
    for values in [vec![1.0f32, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]] {
        h.feed_vec("row", &[1, 2], values);
        h.run(&OperatorDef::new("EnqueueBlobs", &["queue", "row"], &["row"]))
            .unwrap();
    }

    let def = OperatorDef::new("SafeDequeueBlobs", &["queue"], &["batch", "status"])
        .with_arg("num_records", 2);
    h.run(&def).unwrap();
    let batch = h.fetch("batch");
    assert_eq!(batch.dims(), &[2, 2]);
    assert_eq!(batch.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(h.fetch_vec::<bool>("status"), vec![false]);

    // One record left: a short batch still counts as data
    h.run(&OperatorDef::new("CloseBlobsQueue", &["queue"], &[]))
        .unwrap();
    h.run(&def).unwrap();
    assert_eq!(h.fetch("batch").dims(), &[1, 2]);
    assert_eq!(h.fetch_vec::<f32>("batch"), vec![5.0, 6.0]);
    assert_eq!(h.fetch_vec::<bool>("status"), vec![false]);

    // Nothing left to read
    h.run(&def).unwrap();
    assert_eq!(h.fetch_vec::<bool>("status"), vec![true]);
    assert_eq!(h.fetch_vec::<f32>("batch"), vec![5.0, 6.0]);
}

#[test]
fn test_enqueue_outputs_must_be_inputs() {
    let mut h = OpHarness::shared();
    create_queue(&mut h, 1, 1);
    h.feed_vec("a", &[1], vec![1.0f32]);
    for def in [
        OperatorDef::new("EnqueueBlobs", &["queue", "a"], &["b"]),
        OperatorDef::new("SafeEnqueueBlobs", &["queue", "a"], &["b", "status"]),
    ] {
        let err = h.create(&def).err().unwrap();
        assert!(matches!(err, OpsError::InvalidArgument(_)), "{}", def.op_type);
    }
}

#[test]
fn test_dequeue_arity_checked_before_reading() {
    let mut h = OpHarness::shared();
    create_queue(&mut h, 2, 1);
    h.feed_vec("a", &[1], vec![9i32]);
    h.run(&OperatorDef::new("EnqueueBlobs", &["queue", "a"], &["a"]))
        .unwrap();

    for def in [
        OperatorDef::new("DequeueBlobs", &["queue"], &["x", "y"]),
        OperatorDef::new("SafeDequeueBlobs", &["queue"], &["x", "y", "status"]),
    ] {
        let err = h.run(&def).unwrap_err();
        assert!(matches!(err, OpsError::InvalidArgument(_)), "{}", def.op_type);
    }

    // The record is still queued
    h.run(&OperatorDef::new("DequeueBlobs", &["queue"], &["x"]))
        .unwrap();
    assert_eq!(h.fetch_vec::<i32>("x"), vec![9]);
}

#[test]
fn test_unrepresentable_timeout_rejected() {
    let mut h = OpHarness::shared();
    create_queue(&mut h, 1, 1);
    for op_type in ["DequeueBlobs", "SafeDequeueBlobs"] {
        let def = OperatorDef::new(op_type, &["queue"], &["x", "status"])
            .with_arg("timeout_secs", 1.0e30);
        let err = h.create(&def).err().unwrap();
        assert!(matches!(err, OpsError::InvalidArgument(_)), "{}", op_type);
    }
}

#[test]
fn test_safe_dequeue_rejects_zero_records() {
    let mut h = OpHarness::shared();
    create_queue(&mut h, 1, 1);
    let def = OperatorDef::new("SafeDequeueBlobs", &["queue"], &["out", "status"])
        .with_arg("num_records", 0);
    assert!(h.create(&def).is_err());
}

#[test]
fn test_queue_blob_is_not_a_tensor() {
    let mut h = OpHarness::shared();
    create_queue(&mut h, 1, 1);
    let err = h
        .run(&OperatorDef::new("Sqr", &["queue"], &["Y"]))
        .unwrap_err();
    assert!(matches!(err, OpsError::BlobType { .. }));
}

#[test]
fn test_producer_thread_feeds_consumer() {
    let mut h = OpHarness::shared();
    create_queue(&mut h, 1, 1);
    let queue: Arc<BlobsQueue> = h.ws.fetch_queue("queue").unwrap();

    let producer = thread::spawn(move || {
        for i in 0..5 {
            let record = vec![Tensor::from_vec(&[1], vec![i as f32]).unwrap()];
            queue.blocking_write(record).unwrap();
        }
        queue.close().unwrap();
    });

    let dequeue = OperatorDef::new("SafeDequeueBlobs", &["queue"], &["out", "status"])
        .with_arg("timeout_secs", 5.0);
    let mut op = h.create(&dequeue).unwrap();
    let mut seen = Vec::new();
    loop {
        op.run().unwrap();
        if h.fetch_vec::<bool>("status")[0] {
            break;
        }
        seen.push(h.fetch_vec::<f32>("out")[0]);
    }
    producer.join().unwrap();
    assert_eq!(seen, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_unique_names() {
    let mut h = OpHarness::shared();
    let def = OperatorDef::new("CreateBlobsQueue", &[], &["q"])
        .with_name("hipops_queue_tests_unique")
        .with_arg("enforce_unique_name", true);
    h.run(&def).unwrap();
    let err = h.run(&def).unwrap_err();
    assert!(matches!(err, OpsError::InvalidArgument(_)));
}

#[test]
fn test_wait_for_room() {
    let queue = Arc::new(BlobsQueue::new("room", 1, 1, false, Vec::new()).unwrap());
    queue
        .blocking_write(vec![Tensor::scalar(1i32)])
        .unwrap();

    let writer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.blocking_write(vec![Tensor::scalar(2i32)]))
    };
    thread::sleep(Duration::from_millis(20));
    assert_eq!(queue.len(), 1);

    let first = queue.blocking_read(None).unwrap();
    assert_eq!(first[0].to_vec::<i32>().unwrap(), vec![1]);
    writer.join().unwrap().unwrap();
    let second = queue.blocking_read(None).unwrap();
    assert_eq!(second[0].to_vec::<i32>().unwrap(), vec![2]);
}
