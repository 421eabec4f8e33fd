//! Runtime scripts injected into every assembled document.
//!
//! - Error capture: `window.onerror` + `unhandledrejection` + console
//!   forwarding to the parent frame, installed before any user code runs.
//! - Runtime shim: createRoot re-mount patch, `window.require` registry,
//!   inert `os` shim, property-access proxy for unknown modules, and
//!   `process.env` / `exports` polyfills.
//! - CDN URLs for the React/ReactDOM UMD builds and the in-browser
//!   JSX transpiler.

/// Synchronous React UMD build, loaded before user code.
pub const REACT_UMD_URL: &str = "https://unpkg.com/react@18.3.1/umd/react.development.js";

/// Matching ReactDOM UMD build.
pub const REACT_DOM_UMD_URL: &str =
    "https://unpkg.com/react-dom@18.3.1/umd/react-dom.development.js";

/// In-browser JSX-to-JS transpiler.
pub const BABEL_STANDALONE_URL: &str = "https://unpkg.com/@babel/standalone@7/babel.min.js";

/// Sentinel attribute marking the shim script; bootstrap injection is
/// idempotent across recompilations because of it.
pub const SHIM_SENTINEL_ATTR: &str = "data-previewkit-shim";

/// Attribute marking the error-capture script.
pub const CAPTURE_SENTINEL_ATTR: &str = "data-previewkit-capture";

/// Presets applied by the in-browser transpiler to `text/babel` scripts.
pub const BABEL_PRESETS: &str = "env,react";

/// Error capture + console forwarding. Must be the first script in `<head>`
/// so it observes everything that runs after it.
pub fn error_capture_script() -> &'static str {
    r#"(function () {
  function forward(payload) {
    try { window.parent.postMessage(payload, '*'); } catch (err) { /* no parent frame */ }
  }
  window.onerror = function (message, source, line, column, error) {
    forward({
      type: 'PREVIEW_ERROR',
      message: String(message),
      stack: error && error.stack ? String(error.stack) : ''
    });
    return false;
  };
  window.addEventListener('unhandledrejection', function (event) {
    var reason = event.reason || {};
    forward({
      type: 'PREVIEW_ERROR',
      message: String(reason.message || reason),
      stack: String(reason.stack || '')
    });
  });
  ['log', 'info', 'warn', 'error'].forEach(function (level) {
    var original = console[level];
    console[level] = function () {
      var parts = [];
      for (var i = 0; i < arguments.length; i++) {
        var arg = arguments[i];
        try {
          parts.push(arg !== null && typeof arg === 'object' ? JSON.stringify(arg) : String(arg));
        } catch (err) {
          parts.push(String(arg));
        }
      }
      forward({ type: 'console', level: level, message: parts.join(' ') });
      if (original) { original.apply(console, arguments); }
    };
  });
})();"#
}

/// The runtime shim registry. Loaded after React/ReactDOM, before the
/// transpiler, so `require()` calls emitted by the rewriter resolve to the
/// UMD globals. Unknown modules degrade to a warning proxy instead of
/// crashing the whole preview.
pub fn runtime_shim_script() -> &'static str {
    r#"(function () {
  if (!window.process) { window.process = { env: { NODE_ENV: 'development' } }; }
  if (typeof window.exports === 'undefined') { window.exports = {}; }

  var patched = false;
  function patchCreateRoot() {
    if (patched || !window.ReactDOM || !window.ReactDOM.createRoot) { return; }
    patched = true;
    var originalCreateRoot = window.ReactDOM.createRoot.bind(window.ReactDOM);
    window.ReactDOM.createRoot = function (container, options) {
      if (container) {
        for (var key in container) {
          if (key.indexOf('__reactContainer') === 0 || key.indexOf('_reactRootContainer') === 0) {
            delete container[key];
          }
        }
        if (container.parentNode) {
          var fresh = container.cloneNode(false);
          container.parentNode.replaceChild(fresh, container);
          container = fresh;
        }
      }
      return originalCreateRoot(container, options);
    };
  }
  patchCreateRoot();

  var osShim = {
    platform: function () { return 'browser'; },
    arch: function () { return 'wasm'; },
    EOL: '\n'
  };

  function missingModule(name) {
    console.warn('[previewkit] module "' + name + '" is not available in the preview; using an inert shim');
    return new Proxy(function () { return undefined; }, {
      get: function (target, prop) {
        if (prop === '__esModule') { return true; }
        if (prop === 'default') { return target; }
        console.warn('[previewkit] accessed "' + String(prop) + '" on missing module "' + name + '"');
        return function () { return undefined; };
      },
      apply: function () { return undefined; }
    });
  }

  window.require = function (name) {
    if (name === 'react' || name === 'react/jsx-runtime') { return window.React; }
    if (name === 'react-dom' || name === 'react-dom/client') { patchCreateRoot(); return window.ReactDOM; }
    if (name === 'os') { return osShim; }
    return missingModule(name);
  };
})();"#
}
