use chopin::{Context, Method, Router};

fn echo_body(ctx: &mut Context) {
    let body = ctx.request.body.unwrap_or(&[]).to_vec();
    ctx.response = chopin::Response::ok(body);
}

fn set_cookie(ctx: &mut Context) {
    ctx.response = chopin::Response::ok("set").with_header("Set-Cookie", "session=abc123; Path=/");
}

fn whoami(ctx: &mut Context) {
    let cookie = ctx.request.header("Cookie").unwrap_or("none").to_string();
    ctx.response = chopin::Response::ok(cookie);
}

fn go_to_target(ctx: &mut Context) {
    ctx.response = chopin::Response::redirect(303, "/target");
}

fn target(ctx: &mut Context) {
    ctx.response = chopin::Response::ok("landed");
}

// ═══ bodies ═══

#[test]
fn test_post_body_reaches_handler_unchanged() {
    let mut router = Router::new();
    router.post("/echo", echo_body);
    let mut client = chopin::testing::TestClient::new(router);
    let resp = client.post("/echo").body(b"hello body".to_vec()).send();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body_str(), "hello body");
}

#[test]
fn test_empty_body_request_still_dispatches() {
    let mut router = Router::new();
    router.post("/echo", echo_body);
    let mut client = chopin::testing::TestClient::new(router);
    let resp = client.post("/echo").send();
    assert_eq!(resp.status, 200);
    assert!(resp.body.is_empty());
}

// ═══ cookies ═══

#[test]
fn test_set_cookie_replays_on_subsequent_request() {
    let mut router = Router::new();
    router.get("/login", set_cookie);
    router.get("/whoami", whoami);
    let mut client = chopin::testing::TestClient::new(router);
    client.get("/login").send();
    let resp = client.get("/whoami").send();
    assert_eq!(resp.body_str(), "session=abc123");
}

// ═══ redirects ═══

#[test]
fn test_redirect_followed_rewrites_303_to_get() {
    let mut router = Router::new();
    router.get("/start", go_to_target);
    router.get("/target", target);
    let mut client = chopin::testing::TestClient::new(router).follow_redirects(2);
    let resp = client.get("/start").send();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body_str(), "landed");
}

#[test]
fn test_redirect_not_followed_without_opt_in() {
    let mut router = Router::new();
    router.get("/start", go_to_target);
    router.get("/target", target);
    let mut client = chopin::testing::TestClient::new(router);
    let resp = client.get("/start").send();
    assert_eq!(resp.status, 303);
    assert_eq!(resp.header("Location"), Some("/target"));
}

// ═══ headers ═══

fn read_header(ctx: &mut Context) {
    let v = ctx.request.header("X-Custom").unwrap_or("missing").to_string();
    ctx.response = chopin::Response::ok(v);
}

#[test]
fn test_custom_request_header_is_visible_to_handler() {
    let mut router = Router::new();
    router.get("/inspect", read_header);
    let mut client = chopin::testing::TestClient::new(router);
    let resp = client.get("/inspect").header("X-Custom", "present").send();
    assert_eq!(resp.body_str(), "present");
}

#[test]
fn test_put_and_delete_methods_route_correctly() {
    let mut router = Router::new();
    router.put("/item", |ctx: &mut Context| ctx.response = chopin::Response::ok("put"));
    router.delete("/item", |ctx: &mut Context| ctx.response = chopin::Response::ok("delete"));
    let mut client = chopin::testing::TestClient::new(router);
    assert_eq!(client.put("/item").send().body_str(), "put");
    assert_eq!(client.delete("/item").send().body_str(), "delete");
}

#[test]
fn test_method_round_trips_through_as_str() {
    assert_eq!(Method::Get.as_str(), "GET");
    assert_eq!(Method::Post.as_str(), "POST");
}
