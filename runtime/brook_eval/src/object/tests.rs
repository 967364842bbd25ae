use super::*;

fn plain() -> Instance {
    Instance::new(ClassId::new(0), Payload::Plain, Vec::new())
}

fn int(value: i64) -> Instance {
    Instance::new(ClassId::new(1), Payload::Integer(value), Vec::new())
}

#[test]
fn test_clones_share_identity() {
    let a = plain();
    let b = a.clone();
    assert!(a.ptr_eq(&b));
    assert_eq!(a.serial(), b.serial());
    assert_eq!(a.ref_count(), 2);
    drop(b);
    assert_eq!(a.ref_count(), 1);
}

#[test]
fn test_serials_are_unique() {
    let a = plain();
    let b = plain();
    assert!(!a.ptr_eq(&b));
    assert_ne!(a.serial(), b.serial());
}

#[test]
fn test_typed_views() {
    let i = int(7);
    assert_eq!(i.as_int(), Some(7));
    assert_eq!(i.as_number(), Some(7.0));
    assert_eq!(i.as_bool(), None);

    let s = Instance::new(ClassId::new(2), Payload::String("hi".into()), Vec::new());
    assert_eq!(s.as_str(), Some("hi"));
    assert_eq!(s.as_int(), None);
}

#[test]
fn test_slots_read_and_write() {
    let obj = Instance::new(ClassId::new(0), Payload::Plain, vec![int(1), int(2)]);
    assert_eq!(obj.slot(0).and_then(|v| v.as_int()), Some(1));
    assert_eq!(obj.slot(1).and_then(|v| v.as_int()), Some(2));
    assert!(obj.set_slot(1, int(5)));
    assert_eq!(obj.slot(1).and_then(|v| v.as_int()), Some(5));
    assert!(!obj.set_slot(9, int(0)));
    assert!(obj.slot(9).is_none());
}

#[test]
fn test_weak_does_not_keep_alive() {
    let obj = plain();
    let weak = obj.downgrade();
    assert!(weak.is_alive());
    assert!(weak.upgrade().is_some());
    drop(obj);
    assert!(!weak.is_alive());
    assert!(weak.upgrade().is_none());
}

#[test]
fn test_last_drop_queues_destructor_once() {
    let queue = DestructorQueue::new();
    let obj = Instance::with_destructor(ClassId::new(3), Payload::Plain, Vec::new(), &queue);
    let weak = obj.downgrade();
    let copy = obj.clone();

    drop(obj);
    assert_eq!(queue.len(), 0);
    drop(copy);
    assert_eq!(queue.len(), 1);
    // Revived by the queue until the destructor has run.
    assert!(weak.is_alive());

    let due = queue.take();
    assert_eq!(due.len(), 1);
    assert!(due[0].is_destructed());
    drop(due);

    // The second drop is final: no requeue.
    assert_eq!(queue.len(), 0);
    assert!(!weak.is_alive());
}

#[test]
fn test_drop_after_queue_gone_frees_immediately() {
    let queue = DestructorQueue::new();
    let obj = Instance::with_destructor(ClassId::new(3), Payload::Plain, Vec::new(), &queue);
    let weak = obj.downgrade();
    drop(queue);
    drop(obj);
    assert!(!weak.is_alive());
}

#[test]
fn test_plain_instances_never_queue() {
    let queue = DestructorQueue::new();
    let obj = plain();
    drop(obj);
    assert_eq!(queue.len(), 0);
}

#[test]
fn test_list_bounds() {
    let list = ListData::new(ClassId::new(1), vec![int(1), int(2)]);
    assert_eq!(list.get(1).unwrap().as_int(), Some(2));
    assert_eq!(list.get(2).unwrap_err().kind.name(), "IndexOutOfRange");
    assert_eq!(list.get(-1).unwrap_err().kind.name(), "IndexOutOfRange");

    list.insert(2, int(3)).unwrap();
    assert_eq!(list.len(), 3);
    assert!(list.insert(5, int(9)).is_err());

    assert_eq!(list.remove(0).unwrap().as_int(), Some(1));
    list.set(0, int(20)).unwrap();
    assert_eq!(list.get(0).unwrap().as_int(), Some(20));
}

#[test]
fn test_list_snapshot_is_detached() {
    let list = ListData::new(ClassId::new(1), vec![int(1)]);
    let snapshot = list.snapshot();
    list.push(int(2));
    assert_eq!(snapshot.len(), 1);
    assert_eq!(list.len(), 2);
    assert!(list.get_live(1).is_some());
    assert!(list.get_live(2).is_none());
    assert_eq!(list.clear().len(), 2);
    assert!(list.is_empty());
}
