use super::*;

#[test]
fn finish_before_dequeue_fails_not_running() {
    let (queue, _dir) = make_queue();
    let id = queue.enqueue("build", &"payload", Vec::new()).expect("enqueue");

    let result = queue.finish(id, &"too early");
    assert!(matches!(result, Err(QueueError::NotRunning(got)) if got == id));
}

#[test]
fn finish_twice_fails_not_running_the_second_time() {
    let (queue, _dir) = make_queue();
    let id = queue.enqueue("build", &"payload", Vec::new()).expect("enqueue");

    let cancel = CancelToken::new();
    let _: (JobId, String) = queue
        .dequeue(&cancel, &["build".to_string()])
        .expect("dequeue");

    queue.finish(id, &"ok").expect("first finish succeeds");
    let result = queue.finish(id, &"ok again");
    assert!(matches!(result, Err(QueueError::NotRunning(got)) if got == id));
}

#[test]
fn finish_unknown_job_fails_unknown_job() {
    let (queue, _dir) = make_queue();
    let phantom = JobId::new();
    let result = queue.finish(phantom, &"result");
    assert!(matches!(result, Err(QueueError::UnknownJob(got)) if got == phantom));
}
