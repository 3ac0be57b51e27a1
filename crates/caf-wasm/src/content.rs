//! `Content` class: the wake-lock wrapper bound to a page

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use async_trait::async_trait;
use caf_core::{ExtensionMessage, HostError, Messenger, ScreenWakeLock, WakeLockError, WakeLockManager};
use js_sys::{Function, Promise};
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local, JsFuture};
use web_sys::{Event, EventTarget, PageTransitionEvent, VisibilityState};

use crate::chrome::{self, call, error_message, from_js, get_field, to_js};

type ContentManager = WakeLockManager<NavigatorWakeLock, RuntimeMessenger>;

// =============================================================================
// Platform
// =============================================================================

/// `navigator.wakeLock`, holding at most one screen sentinel.
#[derive(Clone, Default)]
pub struct NavigatorWakeLock {
    sentinel: Rc<RefCell<Option<JsValue>>>,
    on_release: Rc<RefCell<Option<Function>>>,
}

impl NavigatorWakeLock {
    fn api() -> Option<JsValue> {
        let navigator = web_sys::window()?.navigator();
        get_field(&navigator, "wakeLock")
    }

    /// Listener attached to every acquired sentinel's `release` event.
    pub fn set_release_listener(&self, listener: Function) {
        *self.on_release.borrow_mut() = Some(listener);
    }
}

fn wake_lock_error(error: JsValue) -> WakeLockError {
    let name = get_field(&error, "name")
        .and_then(|n| n.as_string())
        .unwrap_or_default();
    WakeLockError::from_exception(&name, error_message(&error))
}

fn method(target: &JsValue, name: &str) -> Result<Function, WakeLockError> {
    get_field(target, name)
        .and_then(|f| f.dyn_into::<Function>().ok())
        .ok_or_else(|| WakeLockError::NotSupported(format!("{name} is not available")))
}

#[async_trait(?Send)]
impl ScreenWakeLock for NavigatorWakeLock {
    fn is_supported(&self) -> bool {
        Self::api().is_some()
    }

    async fn request(&self) -> Result<(), WakeLockError> {
        let api = Self::api().ok_or_else(|| WakeLockError::NotSupported("navigator.wakeLock".into()))?;
        let request = method(&api, "request")?;
        let promise: Promise = request
            .call1(&api, &JsValue::from_str("screen"))
            .map_err(wake_lock_error)?
            .dyn_into()
            .map_err(wake_lock_error)?;
        let sentinel = JsFuture::from(promise).await.map_err(wake_lock_error)?;

        if let Some(listener) = self.on_release.borrow().as_ref() {
            let target: &EventTarget = sentinel.unchecked_ref();
            if let Err(e) = target.add_event_listener_with_callback("release", listener) {
                log::warn!("Cannot observe wake lock release: {}", error_message(&e));
            }
        }
        let previous = self.sentinel.borrow_mut().replace(sentinel);
        if let Some(previous) = previous {
            log::debug!("Replacing a held wake lock sentinel");
            // Its release must not read as the platform dropping the new lock
            if let Some(listener) = self.on_release.borrow().as_ref() {
                let target: &EventTarget = previous.unchecked_ref();
                if let Err(e) = target.remove_event_listener_with_callback("release", listener) {
                    log::debug!("Failed to detach release listener: {}", error_message(&e));
                }
            }
            release_sentinel(&previous).await?;
        }
        Ok(())
    }

    async fn release(&self) -> Result<(), WakeLockError> {
        let Some(sentinel) = self.sentinel.borrow_mut().take() else {
            return Ok(());
        };
        release_sentinel(&sentinel).await
    }
}

async fn release_sentinel(sentinel: &JsValue) -> Result<(), WakeLockError> {
    let release = method(sentinel, "release")?;
    let promise: Promise = release
        .call0(sentinel)
        .map_err(wake_lock_error)?
        .dyn_into()
        .map_err(wake_lock_error)?;
    JsFuture::from(promise).await.map_err(wake_lock_error)?;
    Ok(())
}

/// `chrome.runtime.sendMessage` to the background.
pub struct RuntimeMessenger;

#[async_trait(?Send)]
impl Messenger for RuntimeMessenger {
    async fn send_message(&self, message: &ExtensionMessage) -> Result<Option<Value>, HostError> {
        let message = to_js(message)?;
        let reply = call(chrome::runtime_send_message(&message)).await?;
        if reply.is_undefined() || reply.is_null() {
            return Ok(None);
        }
        from_js(reply).map(Some)
    }
}

// =============================================================================
// Content
// =============================================================================

struct DomListener {
    target: EventTarget,
    event: &'static str,
    closure: Closure<dyn FnMut(Event)>,
}

#[wasm_bindgen]
pub struct Content {
    manager: Rc<ContentManager>,
    dom_listeners: Vec<DomListener>,
    // Kept alive for the sentinel `release` events
    _release_listener: Closure<dyn FnMut()>,
    message_listener: Closure<dyn FnMut(JsValue) -> JsValue>,
}

#[wasm_bindgen]
impl Content {
    /// Create the wrapper and subscribe to page and runtime events.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<Content, JsError> {
        let window = web_sys::window().ok_or_else(|| JsError::new("No window in this context"))?;
        let document = window
            .document()
            .ok_or_else(|| JsError::new("No document in this context"))?;

        let wake_lock = NavigatorWakeLock::default();
        let manager = Rc::new(WakeLockManager::new(wake_lock.clone(), RuntimeMessenger));

        let weak = Rc::downgrade(&manager);
        let release_listener = Closure::<dyn FnMut()>::new(move || {
            with_manager(&weak, |m| async move { m.on_lock_released().await });
        });
        wake_lock.set_release_listener(release_listener.as_ref().unchecked_ref::<Function>().clone());

        let mut dom_listeners = Vec::new();

        let weak = Rc::downgrade(&manager);
        let doc = document.clone();
        dom_listeners.push(listen(document.clone().into(), "visibilitychange", move |_| {
            let visible = doc.visibility_state() == VisibilityState::Visible;
            with_manager(&weak, move |m| async move { m.on_visibility_change(visible).await });
        })?);

        let weak = Rc::downgrade(&manager);
        dom_listeners.push(listen(window.clone().into(), "pageshow", move |event| {
            let persisted = event
                .dyn_ref::<PageTransitionEvent>()
                .map(|e| e.persisted())
                .unwrap_or(false);
            with_manager(&weak, move |m| async move { m.on_page_show(persisted).await });
        })?);

        let weak = Rc::downgrade(&manager);
        dom_listeners.push(listen(window.into(), "focus", move |_| {
            with_manager(&weak, |m| async move { m.on_focus().await });
        })?);

        let weak = Rc::downgrade(&manager);
        let message_listener = Closure::<dyn FnMut(JsValue) -> JsValue>::new(move |message: JsValue| {
            let Ok(message) = from_js::<ExtensionMessage>(message) else {
                return JsValue::UNDEFINED;
            };
            if matches!(message, ExtensionMessage::ReleaseLock) {
                with_manager(&weak, move |m| async move {
                    m.handle_message(&message).await;
                });
            }
            JsValue::UNDEFINED
        });
        chrome::add_runtime_message_listener(message_listener.as_ref().unchecked_ref());

        Ok(Content {
            manager,
            dom_listeners,
            _release_listener: release_listener,
            message_listener,
        })
    }

    pub fn start(&self) -> Promise {
        let manager = self.manager.clone();
        future_to_promise(async move {
            manager.start().await;
            Ok(JsValue::UNDEFINED)
        })
    }

    pub fn stop(&self) -> Promise {
        let manager = self.manager.clone();
        future_to_promise(async move {
            manager.stop().await;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Handle a message from the background. Resolves to true when consumed.
    pub fn handle_message(&self, message: JsValue) -> Promise {
        let manager = self.manager.clone();
        future_to_promise(async move {
            let message: ExtensionMessage =
                from_js(message).map_err(|e| JsValue::from(JsError::new(&e.to_string())))?;
            Ok(JsValue::from_bool(manager.handle_message(&message).await))
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.manager.is_enabled()
    }

    pub fn is_held(&self) -> bool {
        self.manager.is_held()
    }
}

impl Drop for Content {
    fn drop(&mut self) {
        for listener in &self.dom_listeners {
            if let Err(e) = listener
                .target
                .remove_event_listener_with_callback(listener.event, listener.closure.as_ref().unchecked_ref())
            {
                log::debug!("Failed to remove {} listener: {}", listener.event, error_message(&e));
            }
        }
        chrome::remove_runtime_message_listener(self.message_listener.as_ref().unchecked_ref());
    }
}

fn listen(
    target: EventTarget,
    event: &'static str,
    handler: impl FnMut(Event) + 'static,
) -> Result<DomListener, JsError> {
    let closure = Closure::<dyn FnMut(Event)>::new(handler);
    target
        .add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
        .map_err(|e| JsError::new(&error_message(&e)))?;
    Ok(DomListener { target, event, closure })
}

/// Run `f` on the manager if it is still alive.
fn with_manager<F, Fut>(manager: &Weak<ContentManager>, f: F)
where
    F: FnOnce(Rc<ContentManager>) -> Fut,
    Fut: std::future::Future<Output = ()> + 'static,
{
    if let Some(manager) = manager.upgrade() {
        spawn_local(f(manager));
    }
}
