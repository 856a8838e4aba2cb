use std::sync::Arc;

use svgbridge::bridge::{register_svg_wrappers, RegistryTable, ScriptSession, WrapperRegistry};
use svgbridge::config::{CacheConfig, ScriptConfig};
use svgbridge::js::ScriptEnvironment;
use svgbridge::model::{Document, MouseData, NativeHandle};

const DRAWING: &str = concat!(
    r#"<svg width="200" height="100">"#,
    r#"<g id="layer" transform="translate(10 20)">"#,
    r#"<rect id="a" x="1" y="2" width="30" height="40"/>"#,
    r#"<rect id="b" width="5" height="5"/>"#,
    r#"</g></svg>"#
);

fn environment() -> ScriptEnvironment {
    ScriptEnvironment::from_svg(DRAWING).expect("environment")
}

fn element(environment: &ScriptEnvironment, id: &str) -> NativeHandle {
    environment
        .session()
        .document()
        .element_by_id(id)
        .expect("element present")
}

#[test]
fn identity_is_preserved_across_the_boundary() {
    let environment = environment();
    let same: bool = environment
        .eval_with(
            r#"
                (() => {
                    const first = document.getElementById('a');
                    const again = document.getElementById('a');
                    const viaTree = document.documentElement.firstChild.firstChild;
                    return first === again && first === viaTree && first.parentNode === viaTree.parentNode;
                })()
            "#,
            "identity.js",
        )
        .expect("identity script");
    assert!(same);
}

#[test]
fn properties_and_methods_forward_to_the_document() {
    let environment = environment();
    environment
        .eval(
            r#"
                const rect = document.getElementById('a');
                rect.setAttribute('fill', 'red');
                rect.style.setProperty('stroke', 'blue');
                rect.width.value = 12;
                rect.className = 'selected';
                console.log('bbox width', rect.getBBox().width);
            "#,
            "forward.js",
        )
        .expect("forwarding script");

    let markup = environment.document_svg().expect("serialize");
    assert!(markup.contains(r#"fill="red""#), "{markup}");
    assert!(markup.contains(r#"style="stroke: blue;""#), "{markup}");
    assert!(markup.contains(r#"width="12""#), "{markup}");
    assert!(markup.contains(r#"class="selected""#), "{markup}");

    let ctm_e: f64 = environment
        .eval_with("document.getElementById('a').getCTM().e", "ctm.js")
        .expect("ctm");
    assert_eq!(ctm_e, 10.0);
}

#[test]
fn disposed_proxy_throws_and_is_replaced() {
    let environment = environment();
    let outcome: String = environment
        .eval_with(
            r#"
                (() => {
                    const rect = document.getElementById('a');
                    rect.dispose();
                    rect.dispose();
                    let message = 'no error';
                    try {
                        rect.id;
                    } catch (err) {
                        message = String(err);
                    }
                    const fresh = document.getElementById('a');
                    return `${fresh !== rect}|${fresh.id}|${message}`;
                })()
            "#,
            "dispose.js",
        )
        .expect("dispose script");

    let parts: Vec<&str> = outcome.splitn(3, '|').collect();
    assert_eq!(parts[0], "true");
    assert_eq!(parts[1], "a");
    assert!(parts[2].contains("disposed"), "{outcome}");
}

#[test]
fn disposed_geometry_values_free_their_storage() {
    let environment = environment();
    environment
        .eval("globalThis.r = document.getElementById('a');", "keep.js")
        .expect("keep rect");
    let before = environment.session().document().len();
    let rooted = environment.rooted_proxies();

    environment
        .eval(
            r#"
                for (let i = 0; i < 500; i++) {
                    r.getBBox().dispose();
                    r.getCTM().dispose();
                    r.transform.dispose();
                    const ctm = r.getCTM();
                    const point = document.documentElement.createSVGPoint();
                    point.matrixTransform(ctm).dispose();
                    point.dispose();
                    ctm.dispose();
                }
            "#,
            "values.js",
        )
        .expect("value loop");

    assert_eq!(environment.session().document().len(), before);
    assert_eq!(environment.rooted_proxies(), rooted + 1);
}

#[test]
fn missing_objects_read_as_null() {
    let environment = environment();
    let result: bool = environment
        .eval_with(
            "document.getElementById('nope') === null && document.parentNode === null",
            "absent.js",
        )
        .expect("absent script");
    assert!(result);
}

#[test]
fn events_bubble_through_listeners() {
    let environment = environment();
    environment
        .eval(
            r#"
                globalThis.seen = [];
                const layer = document.getElementById('layer');
                const rect = document.getElementById('a');
                rect.addEventListener('click', function (event) {
                    seen.push(`rect:${event.clientX}:${this === rect}`);
                    event.preventDefault();
                });
                layer.addEventListener('click', (event) => {
                    seen.push(`layer:${event.target === rect}:${event.currentTarget === layer}`);
                });
            "#,
            "listeners.js",
        )
        .expect("register listeners");
    assert!(environment.session().is_listening("click"));

    let target = element(&environment, "a");
    let outcome = environment
        .dispatch_event(
            target,
            "click",
            Some(MouseData {
                client_x: 7.0,
                client_y: 3.0,
                button: 0,
            }),
        )
        .expect("dispatch click");

    assert!(outcome.default_prevented);
    assert!(!outcome.propagation_stopped);
    assert_eq!(outcome.listeners_invoked, 2);

    let seen: String = environment
        .eval_with("seen.join(',')", "seen.js")
        .expect("seen");
    assert_eq!(seen, "rect:7:true,layer:true:true");
}

#[test]
fn stop_propagation_and_listener_removal() {
    let environment = environment();
    environment
        .eval(
            r#"
                globalThis.calls = 0;
                const layer = document.getElementById('layer');
                const rect = document.getElementById('b');
                const stop = (event) => { calls += 1; event.stopPropagation(); };
                rect.addEventListener('ping', stop);
                rect.addEventListener('ping', stop);
                layer.addEventListener('ping', () => { calls += 100; });
                globalThis.removeStop = () => rect.removeEventListener('ping', stop);
            "#,
            "stop.js",
        )
        .expect("register listeners");

    let target = element(&environment, "b");
    let outcome = environment
        .dispatch_event(target, "ping", None)
        .expect("first dispatch");
    assert!(outcome.propagation_stopped);
    assert_eq!(outcome.listeners_invoked, 1);

    environment.eval("removeStop()", "remove.js").expect("remove");
    environment
        .dispatch_event(target, "ping", None)
        .expect("second dispatch");
    let calls: i32 = environment.eval_with("calls", "calls.js").expect("calls");
    assert_eq!(calls, 101);
}

#[test]
fn repeated_dispatch_leaves_nothing_behind() {
    let environment = environment();
    environment
        .eval(
            r#"
                globalThis.types = 0;
                document.getElementById('a').addEventListener('tick', (event) => {
                    if (event.type === 'tick') {
                        types += 1;
                    }
                });
            "#,
            "tick.js",
        )
        .expect("register listener");
    let target = element(&environment, "a");
    environment
        .dispatch_event(target, "tick", None)
        .expect("first dispatch");

    let rooted = environment.rooted_proxies();
    let handles = environment.script_handle_counts().expect("handle counts");
    let objects = environment.session().document().len();
    for _ in 0..200 {
        environment
            .dispatch_event(target, "tick", None)
            .expect("dispatch");
    }

    assert_eq!(environment.rooted_proxies(), rooted);
    assert_eq!(environment.script_handle_counts().expect("handle counts"), handles);
    assert_eq!(environment.session().document().len(), objects);
    let types: i32 = environment.eval_with("types", "types.js").expect("types");
    assert_eq!(types, 201);
}

#[test]
fn removed_listeners_release_their_closures() {
    let environment = environment();
    environment
        .eval(
            r#"
                const rect = document.getElementById('a');
                for (let i = 0; i < 50; i++) {
                    const onTick = () => {};
                    rect.addEventListener('tick', onTick);
                    rect.addEventListener('tock', onTick);
                    rect.removeEventListener('tick', onTick);
                    rect.removeEventListener('tock', onTick);
                    rect.removeEventListener('tock', onTick);
                }
                globalThis.kept = () => {};
                rect.addEventListener('tick', kept);
                rect.removeEventListener('tock', kept);
            "#,
            "churn.js",
        )
        .expect("listener churn");

    let (_, listeners) = environment.script_handle_counts().expect("handle counts");
    assert_eq!(listeners, 1);
    assert!(environment.session().is_listening("tick"));
    assert!(!environment.session().is_listening("tock"));
}

fn without_events(table: &mut RegistryTable) {
    let mut full = RegistryTable::default();
    register_svg_wrappers(&mut full);
    for entry in full.entries().filter(|entry| !entry.key.ends_with("Event")) {
        table.register(&entry.key, entry.constructor);
    }
}

#[test]
fn failed_dispatch_frees_the_event() {
    let session = ScriptSession::with_registry(
        Document::parse_svg(DRAWING).expect("parse"),
        Arc::new(WrapperRegistry::with_population(without_events)),
        CacheConfig::default(),
    );
    let environment =
        ScriptEnvironment::with_session(session, ScriptConfig::default()).expect("environment");
    environment
        .eval(
            "document.getElementById('a').addEventListener('click', () => {});",
            "listen.js",
        )
        .expect("register listener");
    let objects = environment.session().document().len();
    let rooted = environment.rooted_proxies();

    let target = element(&environment, "a");
    let failed = environment.dispatch_event(target, "click", None);
    assert!(failed.is_err());
    assert_eq!(environment.session().document().len(), objects);
    assert_eq!(environment.rooted_proxies(), rooted);
}

#[test]
fn throwing_listener_does_not_abort_dispatch() {
    let environment = environment();
    environment
        .eval(
            r#"
                globalThis.reached = false;
                document.getElementById('a').addEventListener('boom', () => { throw new Error('listener failed'); });
                document.getElementById('layer').addEventListener('boom', () => { reached = true; });
            "#,
            "throwing.js",
        )
        .expect("register listeners");

    let target = element(&environment, "a");
    environment
        .dispatch_event(target, "boom", None)
        .expect("dispatch despite throw");
    let reached: bool = environment.eval_with("reached", "reached.js").expect("reached");
    assert!(reached);
}

#[test]
fn inline_scripts_run_in_document_order() {
    let markup = concat!(
        r#"<svg><rect id="r" width="1" height="1"/>"#,
        r#"<script>document.getElementById('r').setAttribute('data-step', 'one');</script>"#,
        r#"<script>const r = document.getElementById('r'); r.setAttribute('data-step', r.getAttribute('data-step') + '-two');</script>"#,
        r#"</svg>"#
    );
    let environment = ScriptEnvironment::from_svg(markup).expect("environment");
    let ran = environment.run_inline_scripts().expect("inline scripts");
    assert_eq!(ran, 2);
    let markup = environment.document_svg().expect("serialize");
    assert!(markup.contains(r#"data-step="one-two""#), "{markup}");
}

#[test]
fn inline_scripts_can_be_disabled() {
    let markup = r#"<svg><script>throw new Error('should not run');</script></svg>"#;
    let document = Document::parse_svg(markup).expect("parse");
    let config = ScriptConfig {
        run_inline_scripts: false,
        ..ScriptConfig::default()
    };
    let environment =
        ScriptEnvironment::with_session(ScriptSession::new(document), config).expect("environment");
    assert_eq!(environment.run_inline_scripts().expect("skipped"), 0);
}

#[test]
fn teardown_releases_script_roots() {
    let environment = environment();
    environment
        .eval("globalThis.kept = document.getElementById('a');", "keep.js")
        .expect("keep proxy");
    assert!(environment.rooted_proxies() >= 2);

    environment.teardown().expect("teardown");
    assert_eq!(environment.rooted_proxies(), 0);
    assert!(environment.session().is_closed());
    assert!(environment.eval("kept.id", "after.js").is_err());
}
