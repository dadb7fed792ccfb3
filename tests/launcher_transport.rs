use chainbbs::exec::{status_code, ExecError, ExecutionFlags, Launcher};
mod common;
use common::{CountingIo, MockSpawner};

#[test]
fn exclusive_transport_is_closed_and_reopened_once_on_success() {
    let spawner = MockSpawner::exiting(0);
    let calls = spawner.calls.clone();
    let launcher = Launcher::new(spawner).with_exclusive_transport(true);
    let mut io = CountingIo::default();

    let result = launcher.launch("door.sh", ExecutionFlags::empty(), &mut io);
    assert_eq!(status_code(&result), 0);
    assert_eq!((io.closes, io.opens), (1, 1));
    assert_eq!(calls.spawns(), 1);
    assert_eq!(calls.last_command_line().as_deref(), Some("door.sh"));
}

#[test]
fn exclusive_transport_is_reopened_after_spawn_failure() {
    let launcher = Launcher::new(MockSpawner::failing_spawn()).with_exclusive_transport(true);
    let mut io = CountingIo::default();

    let result = launcher.launch("door.sh", ExecutionFlags::empty(), &mut io);
    assert!(matches!(result, Err(ExecError::Spawn(_))));
    assert_eq!(status_code(&result), ExecError::LAUNCH_FAILED);
    assert_eq!((io.closes, io.opens), (1, 1));
}

#[test]
fn exclusive_transport_is_reopened_after_wait_failure() {
    let launcher = Launcher::new(MockSpawner::failing_wait()).with_exclusive_transport(true);
    let mut io = CountingIo::default();

    let result = launcher.launch("door.sh", ExecutionFlags::empty(), &mut io);
    assert!(matches!(result, Err(ExecError::Wait(_))));
    assert_eq!(status_code(&result), -1);
    assert_eq!((io.closes, io.opens), (1, 1));
}

#[test]
fn shared_transport_is_left_alone() {
    let launcher = Launcher::new(MockSpawner::exiting(0));
    let mut io = CountingIo::default();
    launcher
        .launch("door.sh", ExecutionFlags::empty(), &mut io)
        .unwrap();
    assert_eq!((io.closes, io.opens), (0, 0));
}

#[test]
fn empty_command_line_never_reaches_the_os() {
    for cmd in ["", "   ", "\t\n"] {
        let spawner = MockSpawner::exiting(0);
        let calls = spawner.calls.clone();
        let launcher = Launcher::new(spawner).with_exclusive_transport(true);
        let mut io = CountingIo::default();

        let result = launcher.launch(cmd, ExecutionFlags::empty(), &mut io);
        let err = result.as_ref().unwrap_err();
        assert!(err.is_configuration(), "{:?} should be a configuration error", cmd);
        assert_eq!(status_code(&result), ExecError::CONFIGURATION);
        assert_eq!(calls.spawns(), 0);
        assert_eq!((io.closes, io.opens), (0, 0));
    }
}

#[test]
fn nul_in_command_line_is_a_configuration_error() {
    let spawner = MockSpawner::exiting(0);
    let calls = spawner.calls.clone();
    let launcher = Launcher::new(spawner);
    let result = launcher.launch("door\0.sh", ExecutionFlags::empty(), &mut CountingIo::default());
    assert_eq!(status_code(&result), ExecError::CONFIGURATION);
    assert_eq!(calls.spawns(), 0);
}

#[test]
fn interrupted_waits_are_retried_until_the_child_exits() {
    let spawner = MockSpawner::exiting(3 << 8).interrupted(3);
    let calls = spawner.calls.clone();
    let launcher = Launcher::new(spawner).with_exclusive_transport(true);
    let mut io = CountingIo::default();

    let status = launcher
        .launch("door.sh", ExecutionFlags::empty(), &mut io)
        .unwrap();
    assert_eq!(status.raw(), 3 << 8);
    assert_eq!(calls.spawns(), 1);
    assert_eq!(calls.waits(), 4);
    assert_eq!((io.closes, io.opens), (1, 1));
}

#[test]
fn unsupported_flags_do_not_stop_the_launch() {
    let spawner = MockSpawner::exiting(0);
    let calls = spawner.calls.clone();
    let launcher = Launcher::new(spawner).with_capabilities(|_| false);

    let flags = ExecutionFlags::FOSSIL | ExecutionFlags::COMIO | ExecutionFlags::LOCAL_CONSOLE_CP437;
    let result = launcher.launch("door.sh", flags, &mut CountingIo::default());
    assert!(result.is_ok());
    assert_eq!(calls.spawns(), 1);
}

#[test]
fn raw_status_is_returned_undecoded() {
    let launcher = Launcher::new(MockSpawner::exiting(0x0f00));
    let status = launcher
        .launch("door.sh", ExecutionFlags::empty(), &mut CountingIo::default())
        .unwrap();
    assert_eq!(status.raw(), 0x0f00);
}
