//! Behavioural tests for server supervision using `rstest-bdd`.

mod support;

use std::cell::RefCell;
use std::path::PathBuf;
use std::process::ExitStatus;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempredis::{
    ReadinessMarker, Server, ServerConfig, ServerError, ServerOptions, Transport,
};

use support::{ping, stub_options};

struct TestWorld {
    config: ServerConfig,
    options: ServerOptions,
    server: Option<Server>,
    occupant: Option<Server>,
    start_result: Option<Result<ReadinessMarker, ServerError>>,
    stop_result: Option<Result<ExitStatus, ServerError>>,
    socket_dir: Option<PathBuf>,
}

impl TestWorld {
    fn new() -> Self {
        Self {
            config: ServerConfig::new(),
            options: stub_options(),
            server: None,
            occupant: None,
            start_result: None,
            stop_result: None,
            socket_dir: None,
        }
    }

    fn server(&self) -> &Server {
        self.server.as_ref().expect("server has not been created")
    }

    fn server_mut(&mut self) -> &mut Server {
        self.server.as_mut().expect("server has not been created")
    }

    fn start_error(&self) -> &ServerError {
        match self.start_result.as_ref() {
            Some(Err(error)) => error,
            Some(Ok(marker)) => panic!("startup unexpectedly succeeded with {marker}"),
            None => panic!("the server was never started"),
        }
    }

    fn exit_status(&self) -> ExitStatus {
        match self.stop_result.as_ref() {
            Some(Ok(status)) => *status,
            Some(Err(error)) => panic!("stopping the server failed: {error}"),
            None => panic!("the server was never stopped"),
        }
    }
}

#[fixture]
fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}

#[given("a stub server configuration")]
fn given_stub_configuration(world: &RefCell<TestWorld>) {
    world.borrow_mut().config.set("databases", "4");
}

#[given("the server listens on a private unix socket")]
fn given_unix_socket(world: &RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    world.options = world.options.clone().with_transport(Transport::UnixSocket);
}

#[given("the configuration sets \"{key}\" to \"{value}\"")]
fn given_directive(world: &RefCell<TestWorld>, key: String, value: String) {
    world.borrow_mut().config.set(key, value);
}

#[given("the server waits for the \"{marker}\" marker")]
fn given_marker(world: &RefCell<TestWorld>, marker: String) {
    let marker = match marker.as_str() {
        "ready" => ReadinessMarker::Ready,
        "rdb" => ReadinessMarker::RdbLoaded,
        "aof" => ReadinessMarker::AofLoaded,
        other => panic!("unknown marker '{other}'"),
    };
    let mut world = world.borrow_mut();
    world.options = world.options.clone().with_markers([marker]);
}

#[given("another server already listens on the same port")]
fn given_occupied_port(world: &RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    let mut occupant = Server::with_options(world.config.clone(), world.options.clone());
    occupant.start().expect("occupying server should start");
    let port = occupant.config().port().to_owned();
    world.config.set("port", port);
    world.occupant = Some(occupant);
}

#[when("the server starts")]
fn when_server_starts(world: &RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    let mut server = Server::with_options(world.config.clone(), world.options.clone());
    let result = server.start();
    world.socket_dir = server.socket_dir().map(PathBuf::from);
    world.server = Some(server);
    world.start_result = Some(result);
}

#[when("the server is terminated")]
fn when_server_terminated(world: &RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    let result = world.server_mut().term();
    world.stop_result = Some(result);
}

#[when("the server is killed")]
fn when_server_killed(world: &RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    let result = world.server_mut().kill();
    world.stop_result = Some(result);
}

#[then("startup succeeds with the \"{marker}\" marker")]
fn then_startup_succeeds(world: &RefCell<TestWorld>, marker: String) {
    let world = world.borrow();
    match world.start_result.as_ref() {
        Some(Ok(observed)) => assert_eq!(observed.to_string(), marker),
        Some(Err(error)) => panic!("startup failed: {error}"),
        None => panic!("the server was never started"),
    }
    assert!(world.server().is_running());
}

#[then("the server answers a ping")]
fn then_server_answers(world: &RefCell<TestWorld>) {
    let world = world.borrow();
    let reply = ping(world.server()).expect("ping should reach the server");
    assert_eq!(reply, "+PONG");
}

#[then("the server exited successfully")]
fn then_exited_successfully(world: &RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    let status = world.exit_status();
    assert!(status.success(), "expected a clean exit, got {status:?}");
    let stdout = world.server_mut().stdout();
    assert!(
        stdout.contains("ready to exit"),
        "expected shutdown notice in stdout: {stdout}"
    );
}

#[then("the server did not exit successfully")]
fn then_exited_unsuccessfully(world: &RefCell<TestWorld>) {
    let status = world.borrow().exit_status();
    assert!(!status.success(), "a killed server cannot exit cleanly");
}

#[then("the captured output lacks \"{text}\"")]
fn then_output_lacks(world: &RefCell<TestWorld>, text: String) {
    let stdout = world.borrow_mut().server_mut().stdout();
    assert!(!stdout.contains(&text), "unexpected {text:?} in stdout: {stdout}");
}

#[then("stopping the server again fails because it is not running")]
fn then_second_stop_fails(world: &RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    let server = world.server_mut();
    assert!(matches!(server.term(), Err(ServerError::NotRunning)));
    assert!(matches!(server.kill(), Err(ServerError::NotRunning)));
    assert!(!server.is_running());
}

#[then("the socket directory has been removed")]
fn then_socket_dir_removed(world: &RefCell<TestWorld>) {
    let world = world.borrow();
    let exit = world.exit_status();
    assert!(exit.success());
    let dir = world
        .socket_dir
        .as_ref()
        .expect("a socket directory should have been created");
    assert!(!dir.exists(), "{} still exists", dir.display());
    assert!(world.server().socket_dir().is_none());
}

#[then("startup fails because the output ended")]
fn then_startup_stream_ended(world: &RefCell<TestWorld>) {
    let world = world.borrow();
    let error = world.start_error();
    assert!(
        matches!(error, ServerError::ReadinessStreamEnded { .. }),
        "expected the output to end early, got: {error}"
    );
    assert!(!world.server().is_running());
}

#[then("the last reported line mentions \"{text}\"")]
fn then_last_line_mentions(world: &RefCell<TestWorld>, text: String) {
    let world = world.borrow();
    match world.start_error() {
        ServerError::ReadinessStreamEnded { last_line, .. }
        | ServerError::ReadinessTimeout { last_line, .. } => {
            assert!(
                last_line.contains(&text),
                "expected {text:?} in last line: {last_line:?}"
            );
        }
        other => panic!("expected a readiness error, got: {other}"),
    }
}

#[scenario(
    path = "tests/features/server_lifecycle.feature",
    name = "A started server answers and stops cleanly"
)]
fn started_server_stops_cleanly(world: RefCell<TestWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/server_lifecycle.feature",
    name = "Killing a server skips its shutdown sequence"
)]
fn killed_server_skips_shutdown(world: RefCell<TestWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/server_lifecycle.feature",
    name = "Unix socket servers clean up their socket directory"
)]
fn unix_socket_directory_is_removed(world: RefCell<TestWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/server_lifecycle.feature",
    name = "An unknown directive fails startup with its diagnostic"
)]
fn unknown_directive_fails_startup(world: RefCell<TestWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/server_lifecycle.feature",
    name = "A port that is already taken fails startup"
)]
fn occupied_port_fails_startup(world: RefCell<TestWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/server_lifecycle.feature",
    name = "Waiting for the append-only log to load"
)]
fn aof_marker_satisfies_startup(world: RefCell<TestWorld>) {
    let _ = world;
}
