use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{anyhow, Context as AnyhowContext, Result};
use rquickjs::{Ctx, Function, IntoJs};
use serde_json::to_string as to_json_string;
use tracing::{debug, error, info};

use super::runtime::QuickJsEngine;
use super::wire::{self, ProxyRoots};
use crate::bridge::{
    BridgeError, BridgeResult, Capability, EventTarget, ListenerId, MemberKind, ScriptSession,
    ScriptValue, WrapperInstance,
};
use crate::config::ScriptConfig;
use crate::model::{Document, MouseData, NativeHandle};

/// Result of dispatching one event through the script listeners.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub default_prevented: bool,
    pub propagation_stopped: bool,
    pub listeners_invoked: usize,
}

/// A QuickJS context bound to one script session. Script sees the native
/// document as `document` and every object reachable from it as a proxy.
pub struct ScriptEnvironment {
    engine: QuickJsEngine,
    session: Rc<ScriptSession>,
    roots: Rc<RefCell<ProxyRoots>>,
    config: ScriptConfig,
}

impl ScriptEnvironment {
    pub fn new(document: Document) -> Result<Self> {
        Self::with_session(ScriptSession::new(document), ScriptConfig::default())
    }

    pub fn from_svg(markup: &str) -> Result<Self> {
        let document = Document::parse_svg(markup).context("failed to parse SVG document")?;
        Self::new(document)
    }

    pub fn with_session(session: ScriptSession, config: ScriptConfig) -> Result<Self> {
        let engine = QuickJsEngine::new(config.max_pending_jobs)?;
        let session = Rc::new(session);
        let roots = Rc::new(RefCell::new(ProxyRoots::default()));
        install_bridge_bindings(&engine, Rc::clone(&session), Rc::clone(&roots))?;
        engine
            .eval(BRIDGE_BOOTSTRAP, "svgbridge-bootstrap.js")
            .context("failed to install script bootstrap")?;
        debug!(target = "svgbridge", session = session.id(), "script environment ready");
        Ok(Self {
            engine,
            session,
            roots,
            config,
        })
    }

    pub fn session(&self) -> &ScriptSession {
        &self.session
    }

    /// Proxies currently held by script.
    pub fn rooted_proxies(&self) -> usize {
        self.roots.borrow().len()
    }

    pub fn eval(&self, source: &str, filename: &str) -> Result<()> {
        self.ensure_open()?;
        self.engine.eval(source, filename)
    }

    pub fn eval_with<V>(&self, source: &str, filename: &str) -> Result<V>
    where
        V: for<'js> rquickjs::FromJs<'js>,
    {
        self.ensure_open()?;
        self.engine.eval_with(source, filename)
    }

    /// Evaluate every `<script>` element of the document in document order.
    /// Returns how many ran; a failing script is logged and skipped.
    pub fn run_inline_scripts(&self) -> Result<usize> {
        if !self.config.run_inline_scripts {
            debug!(target = "svgbridge", "inline scripts disabled");
            return Ok(0);
        }
        let sources = {
            let document = self.session.document();
            let scripts = document.elements_by_tag_name(document.root(), "script")?;
            scripts
                .into_iter()
                .map(|script| document.text_content(script).map(Option::unwrap_or_default))
                .collect::<Result<Vec<_>, _>>()?
        };

        let mut ran = 0;
        for (index, source) in sources.iter().enumerate() {
            let filename = format!("inline-script-{}.js", index + 1);
            match self.eval(source, &filename) {
                Ok(()) => ran += 1,
                Err(err) => {
                    error!(target = "svgbridge", script = %filename, error = %err, "inline script failed")
                }
            }
        }
        info!(target = "svgbridge", ran, total = sources.len(), "ran inline scripts");
        Ok(ran)
    }

    /// Fire `event_type` at `target` and let it bubble through the ancestors,
    /// invoking script listeners registered on each node.
    pub fn dispatch_event(
        &self,
        target: NativeHandle,
        event_type: &str,
        mouse: Option<MouseData>,
    ) -> Result<DispatchOutcome> {
        self.ensure_open()?;
        if !self.session.is_listening(event_type) {
            return Ok(DispatchOutcome::default());
        }

        let path = self.session.propagation_path(target)?;
        let event = self
            .session
            .document_mut()
            .create_event(event_type, Some(target), mouse);
        let dispatched = self.run_listeners(event, event_type, &path);
        if let Err(err) = self.session.document_mut().destroy(event) {
            error!(target = "svgbridge", error = %err, event_type, "failed to free event object");
        }
        let outcome = dispatched?;

        debug!(
            target = "svgbridge",
            event_type,
            listeners = outcome.listeners_invoked,
            default_prevented = outcome.default_prevented,
            "dispatched event"
        );
        Ok(outcome)
    }

    fn run_listeners(
        &self,
        event: NativeHandle,
        event_type: &str,
        path: &[NativeHandle],
    ) -> Result<DispatchOutcome> {
        let event_proxy = self
            .session
            .create_wrapper(Some(event))?
            .ok_or_else(|| anyhow!("event object vanished before dispatch"))?;
        let event_json = self.encode(&ScriptValue::Proxy(event_proxy.clone()));
        let walked = self.walk_path(event, event_type, path, &event_json);
        self.forget_proxy(&event_proxy);

        let listeners_invoked = walked?;
        let document = self.session.document();
        let data = document.event(event)?;
        Ok(DispatchOutcome {
            default_prevented: data.default_prevented,
            propagation_stopped: data.propagation_stopped,
            listeners_invoked,
        })
    }

    fn walk_path(
        &self,
        event: NativeHandle,
        event_type: &str,
        path: &[NativeHandle],
        event_json: &str,
    ) -> Result<usize> {
        let mut invoked = 0;
        for &node in path {
            let listeners = self.session.listeners_for(node, event_type);
            if listeners.is_empty() {
                continue;
            }
            self.session.document_mut().event_mut(event)?.current_target = Some(node);
            let current = ScriptValue::from_proxy(self.session.create_wrapper(Some(node))?);
            let current_json = self.encode(&current);
            let ids: Vec<u64> = listeners.iter().map(|listener| listener.0).collect();
            let ids_json = to_json_string(&ids)?;

            let invoke_result = self.engine.with_context(|ctx| {
                let invoke: Function = ctx.globals().get("__svgbridgeInvoke")?;
                invoke.call::<_, ()>((event_json.to_string(), current_json, ids_json))
            });
            if let Err(err) = invoke_result {
                error!(target = "svgbridge", error = %err, event_type, "failed to invoke listeners");
            }
            self.engine.drain_jobs()?;
            invoked += listeners.len();

            if self.session.document().event(event)?.propagation_stopped {
                break;
            }
        }
        Ok(invoked)
    }

    /// Unroot a proxy the bridge handed to script on its own behalf and drop
    /// the script-side object for it.
    fn forget_proxy(&self, proxy: &WrapperInstance) {
        let id = proxy.id();
        if let Err(err) = self.roots.borrow_mut().release(id) {
            debug!(target = "svgbridge", proxy = %id, error = %err, "proxy was not rooted");
        }
        let forgotten = self.engine.with_context(|ctx| {
            let forget: Function = ctx.globals().get("__svgbridgeForget")?;
            forget.call::<_, ()>((id.0 as f64,))
        });
        if let Err(err) = forgotten {
            error!(target = "svgbridge", proxy = %id, error = %err, "failed to drop script proxy");
        }
        proxy.dispose();
    }

    /// Proxy objects and listener closures the script side currently holds.
    pub fn script_handle_counts(&self) -> Result<(usize, usize)> {
        self.engine.with_context(|ctx| {
            let sizes: Function = ctx.globals().get("__svgbridgeSizes")?;
            let counts: Vec<u32> = sizes.call(())?;
            let objects = counts.first().copied().unwrap_or_default() as usize;
            let listeners = counts.get(1).copied().unwrap_or_default() as usize;
            Ok((objects, listeners))
        })
    }

    /// Serialize the current document back to SVG markup.
    pub fn document_svg(&self) -> Result<String> {
        Ok(self.session.document().to_svg()?)
    }

    /// Release every proxy script holds and close the session.
    pub fn teardown(&self) -> Result<()> {
        if self.session.is_closed() {
            return Ok(());
        }
        let released = self.roots.borrow_mut().clear();
        self.session.teardown();
        let reset = self.engine.with_context(|ctx| {
            let reset: Function = ctx.globals().get("__svgbridgeReset")?;
            reset.call::<_, ()>(())
        });
        if let Err(err) = reset {
            error!(target = "svgbridge", error = %err, "failed to reset script bootstrap");
        }
        info!(target = "svgbridge", released, "script environment torn down");
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.session.is_closed() {
            return Err(BridgeError::SessionClosed.into());
        }
        Ok(())
    }

    fn encode(&self, value: &ScriptValue) -> String {
        wire::encode(value, &mut self.roots.borrow_mut()).to_string()
    }
}

impl Drop for ScriptEnvironment {
    fn drop(&mut self) {
        if let Err(err) = self.teardown() {
            error!(target = "svgbridge", error = %err, "teardown failed");
        }
    }
}

fn install_bridge_bindings(
    engine: &QuickJsEngine,
    session: Rc<ScriptSession>,
    roots: Rc<RefCell<ProxyRoots>>,
) -> Result<()> {
    engine.with_context(|ctx| {
        let global = ctx.globals();

        {
            let session = Rc::clone(&session);
            let roots = Rc::clone(&roots);
            let func = Function::new(
                ctx.clone(),
                move |ctx: Ctx<'_>| -> rquickjs::Result<String> {
                    match session.document_proxy() {
                        Ok(document) => Ok(wire::encode_result(
                            &ScriptValue::Proxy(document),
                            &mut roots.borrow_mut(),
                        )),
                        Err(err) => bridge_error(&ctx, err),
                    }
                },
            )?
            .with_name("__svgbridge_document")?;
            global.set("__svgbridge_document", func)?;
        }

        {
            let roots = Rc::clone(&roots);
            let func = Function::new(
                ctx.clone(),
                move |ctx: Ctx<'_>, id: f64, name: String| -> rquickjs::Result<String> {
                    let member = resolve(&roots, id).map(|wrapper| wrapper.member_kind(&name));
                    match member {
                        Ok(Some(MemberKind::Property)) => Ok("property".to_string()),
                        Ok(Some(MemberKind::Method)) => Ok("method".to_string()),
                        Ok(None) => Ok(String::new()),
                        Err(err) => bridge_error(&ctx, err),
                    }
                },
            )?
            .with_name("__svgbridge_member")?;
            global.set("__svgbridge_member", func)?;
        }

        {
            let roots = Rc::clone(&roots);
            let func = Function::new(
                ctx.clone(),
                move |ctx: Ctx<'_>, id: f64, name: String| -> rquickjs::Result<String> {
                    let value = resolve(&roots, id).and_then(|wrapper| wrapper.get(&name));
                    match value {
                        Ok(value) => Ok(wire::encode_result(&value, &mut roots.borrow_mut())),
                        Err(err) => bridge_error(&ctx, err),
                    }
                },
            )?
            .with_name("__svgbridge_get")?;
            global.set("__svgbridge_get", func)?;
        }

        {
            let roots = Rc::clone(&roots);
            let func = Function::new(
                ctx.clone(),
                move |ctx: Ctx<'_>, id: f64, name: String, args: String| -> rquickjs::Result<()> {
                    let outcome = resolve(&roots, id).and_then(|wrapper| {
                        let value = wire::decode_args(&args, &roots.borrow())?
                            .into_iter()
                            .next()
                            .unwrap_or_default();
                        wrapper.set(&name, value)
                    });
                    match outcome {
                        Ok(()) => Ok(()),
                        Err(err) => bridge_error(&ctx, err),
                    }
                },
            )?
            .with_name("__svgbridge_set")?;
            global.set("__svgbridge_set", func)?;
        }

        {
            let roots = Rc::clone(&roots);
            let func = Function::new(
                ctx.clone(),
                move |ctx: Ctx<'_>, id: f64, name: String, args: String| -> rquickjs::Result<String> {
                    let result = resolve(&roots, id).and_then(|wrapper| {
                        let args = wire::decode_args(&args, &roots.borrow())?;
                        wrapper.call(&name, &args)
                    });
                    match result {
                        Ok(value) => Ok(wire::encode_result(&value, &mut roots.borrow_mut())),
                        Err(err) => bridge_error(&ctx, err),
                    }
                },
            )?
            .with_name("__svgbridge_call")?;
            global.set("__svgbridge_call", func)?;
        }

        {
            let roots = Rc::clone(&roots);
            let func = Function::new(
                ctx.clone(),
                move |ctx: Ctx<'_>, id: f64| -> rquickjs::Result<()> {
                    let released = wire::proxy_id(id).and_then(|id| roots.borrow_mut().release(id));
                    match released {
                        Ok(()) => Ok(()),
                        Err(err) => bridge_error(&ctx, err),
                    }
                },
            )?
            .with_name("__svgbridge_dispose")?;
            global.set("__svgbridge_dispose", func)?;
        }

        {
            let roots = Rc::clone(&roots);
            let func = Function::new(
                ctx.clone(),
                move |ctx: Ctx<'_>,
                      id: f64,
                      event_type: String,
                      listener: f64,
                      add: bool|
                      -> rquickjs::Result<bool> {
                    let changed = resolve(&roots, id).and_then(|wrapper| {
                        let target = wrapper.as_event_target().ok_or(BridgeError::Incompatible {
                            kind: wrapper.kind(),
                            capability: Capability::EventTarget,
                        })?;
                        let listener = ListenerId(listener as u64);
                        if add {
                            target.add_event_listener(&event_type, listener)
                        } else {
                            target.remove_event_listener(&event_type, listener)
                        }
                    });
                    match changed {
                        Ok(changed) => Ok(changed),
                        Err(err) => bridge_error(&ctx, err),
                    }
                },
            )?
            .with_name("__svgbridge_listen")?;
            global.set("__svgbridge_listen", func)?;
        }

        Ok(())
    })
}

fn resolve(
    roots: &Rc<RefCell<ProxyRoots>>,
    id: f64,
) -> BridgeResult<WrapperInstance> {
    let id = wire::proxy_id(id)?;
    roots.borrow().resolve(id)
}

fn bridge_error<T>(ctx: &Ctx<'_>, err: BridgeError) -> rquickjs::Result<T> {
    debug!(target = "svgbridge", error = %err, "bridge call failed");
    let message = err.to_string();
    let value = message.into_js(ctx)?;
    Err(ctx.throw(value))
}

const BRIDGE_BOOTSTRAP: &str = r#"
(() => {
    const global = globalThis;
    const objects = new Map();
    const proxyIds = new WeakMap();
    const methods = new Map();
    const listeners = new Map();
    const listenerIds = new Map();
    const listenerRefs = new Map();
    let nextListener = 1;

    const revive = (value) => {
        if (Array.isArray(value)) {
            return value.map(revive);
        }
        if (value !== null && typeof value === 'object' && '$proxy' in value) {
            return wrap(value.$proxy, value.$kind);
        }
        return value;
    };

    const decode = (text) => (text === '' ? undefined : revive(JSON.parse(text)));

    const lower = (value) => {
        if (value !== null && typeof value === 'object' && proxyIds.has(value)) {
            return { $proxy: proxyIds.get(value) };
        }
        if (Array.isArray(value)) {
            return value.map(lower);
        }
        if (value === undefined || typeof value === 'function' || typeof value === 'symbol') {
            return null;
        }
        return value;
    };

    const encode = (args) => JSON.stringify(Array.from(args, lower));

    const dispose = (id) => {
        global.__svgbridge_dispose(id);
        objects.delete(id);
        methods.delete(id);
    };

    const listen = (id, type, fn, add) => {
        if (typeof fn !== 'function') {
            return;
        }
        let lid = listenerIds.get(fn);
        if (lid === undefined) {
            if (!add) {
                return;
            }
            lid = nextListener++;
            listenerIds.set(fn, lid);
            listeners.set(lid, fn);
            listenerRefs.set(lid, 0);
        }
        try {
            if (global.__svgbridge_listen(id, String(type), lid, add)) {
                listenerRefs.set(lid, listenerRefs.get(lid) + (add ? 1 : -1));
            }
        } finally {
            // A closure no target refers to any more is dropped.
            if (listenerRefs.get(lid) === 0) {
                listenerRefs.delete(lid);
                listeners.delete(lid);
                listenerIds.delete(fn);
            }
        }
    };

    const method = (id, name) => {
        let own = methods.get(id);
        if (!own) {
            own = new Map();
            methods.set(id, own);
        }
        let fn = own.get(name);
        if (!fn) {
            fn = (...args) => decode(global.__svgbridge_call(id, name, encode(args)));
            own.set(name, fn);
        }
        return fn;
    };

    const wrap = (id, kind) => {
        const existing = objects.get(id);
        if (existing) {
            return existing;
        }
        const proxy = new Proxy({}, {
            get(target, name) {
                if (typeof name !== 'string') {
                    return undefined;
                }
                switch (name) {
                    case '__kind':
                        return kind;
                    case 'toString':
                        return () => `[object ${kind}]`;
                    case 'dispose':
                        return () => dispose(id);
                    case 'addEventListener':
                        return (type, fn) => listen(id, type, fn, true);
                    case 'removeEventListener':
                        return (type, fn) => listen(id, type, fn, false);
                    case 'then':
                        return undefined;
                }
                const member = global.__svgbridge_member(id, name);
                if (member === 'method') {
                    return method(id, name);
                }
                if (member === 'property') {
                    return decode(global.__svgbridge_get(id, name));
                }
                return undefined;
            },
            set(target, name, value) {
                if (typeof name !== 'string') {
                    return false;
                }
                global.__svgbridge_set(id, name, encode([value]));
                return true;
            },
            has(target, name) {
                return typeof name === 'string' && global.__svgbridge_member(id, name) !== '';
            },
        });
        objects.set(id, proxy);
        proxyIds.set(proxy, id);
        return proxy;
    };

    global.__svgbridgeInvoke = (eventJson, targetJson, idsJson) => {
        const event = decode(eventJson);
        const currentTarget = decode(targetJson);
        for (const lid of JSON.parse(idsJson)) {
            const fn = listeners.get(lid);
            if (!fn) {
                continue;
            }
            try {
                fn.call(currentTarget, event);
            } catch (err) {
                const message = err && err.message ? err.message : String(err);
                global.__svgbridge_log('error', `listener for ${event.type} threw: ${message}`);
            }
        }
    };

    global.__svgbridgeForget = (id) => {
        objects.delete(id);
        methods.delete(id);
    };

    global.__svgbridgeSizes = () => [objects.size, listeners.size];

    global.__svgbridgeReset = () => {
        objects.clear();
        methods.clear();
        listeners.clear();
        listenerIds.clear();
        listenerRefs.clear();
    };

    global.document = decode(global.__svgbridge_document());
})();
"#;
