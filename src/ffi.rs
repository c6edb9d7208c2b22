//! C FFI: exposes the Korean frontend to iOS / Android hosts.
//!
//! Inference stays on the host side; these functions only cover text
//! processing.  Results that carry structure are returned as JSON.
//!
//! ## Memory contract
//!
//! | Function                              | Caller frees with              |
//! |---------------------------------------|--------------------------------|
//! | [`melo_ko_frontend_load`]             | [`melo_ko_frontend_free`]      |
//! | [`melo_ko_frontend_load_config`]      | [`melo_ko_frontend_free`]      |
//! | [`melo_ko_frontend_g2p`]              | [`melo_ko_free_string`]        |
//! | [`melo_ko_frontend_pronounce`]        | [`melo_ko_free_string`]        |
//! | [`melo_ko_split_sentences`]           | [`melo_ko_free_string`]        |

use std::ffi::{c_char, CStr, CString};
use std::path::Path;

use log::error;

use crate::config::FrontendConfig;
use crate::frontend::KoreanFrontend;
use crate::sentence::split_sentences;

/// Opaque handle to a loaded frontend.
pub struct MeloKoFrontendHandle {
    frontend: KoreanFrontend,
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Copy a C string into an owned `String`, `None` for null.  Invalid UTF-8
/// is replaced, not rejected.
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

/// Heap-allocate an owned C string.  Returns null on interior nul bytes.
fn to_c_str(s: &str) -> *const c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        Err(_) => std::ptr::null(),
    }
}

fn boxed(frontend: KoreanFrontend) -> *mut MeloKoFrontendHandle {
    Box::into_raw(Box::new(MeloKoFrontendHandle { frontend }))
}

// ─── Public API ──────────────────────────────────────────────────────────────

/// Load a frontend with default settings.
///
/// @param vocab_path  UTF-8 path to the WordPiece `vocab.txt`, or `NULL`.
///                    A missing vocabulary is not fatal: every word is then
///                    treated as unknown.
/// @return            Frontend handle.  Free with [`melo_ko_frontend_free`].
#[no_mangle]
pub unsafe extern "C" fn melo_ko_frontend_load(vocab_path: *const c_char) -> *mut MeloKoFrontendHandle {
    let config = FrontendConfig {
        vocab_path: unsafe { cstr_to_string(vocab_path) }.map(Into::into),
        ..FrontendConfig::default()
    };
    boxed(KoreanFrontend::from_config(&config))
}

/// Load a frontend from a JSON config file (see [`FrontendConfig`]).
///
/// @return  Frontend handle, or `NULL` if the file cannot be read or parsed.
#[no_mangle]
pub unsafe extern "C" fn melo_ko_frontend_load_config(config_path: *const c_char) -> *mut MeloKoFrontendHandle {
    let Some(path) = (unsafe { cstr_to_string(config_path) }) else {
        error!("melo_ko_frontend_load_config: null argument");
        return std::ptr::null_mut();
    };
    match FrontendConfig::from_json_file(Path::new(&path)) {
        Ok(config) => boxed(KoreanFrontend::from_config(&config)),
        Err(e) => {
            error!("melo_ko_frontend_load_config: {e:#}");
            std::ptr::null_mut()
        }
    }
}

/// Convert one sentence and return the G2P result as JSON:
/// `{"phones":[…],"phone_ids":[…],"tones":[…],"word2ph":[…]}`.
///
/// @return  Heap-allocated UTF-8 JSON, or `NULL` on a null argument.
///          Free with [`melo_ko_free_string`].
#[no_mangle]
pub unsafe extern "C" fn melo_ko_frontend_g2p(
    handle: *const MeloKoFrontendHandle,
    text: *const c_char,
) -> *const c_char {
    if handle.is_null() {
        return std::ptr::null();
    }
    let Some(text) = (unsafe { cstr_to_string(text) }) else {
        return std::ptr::null();
    };
    let h = unsafe { &*handle };
    match serde_json::to_string(&h.frontend.convert(&text)) {
        Ok(json) => to_c_str(&json),
        Err(e) => {
            error!("melo_ko_frontend_g2p: {e}");
            std::ptr::null()
        }
    }
}

/// Apply the pronunciation rules and return the respelled Hangul text,
/// e.g. `국물이` → `궁무리`.
#[no_mangle]
pub unsafe extern "C" fn melo_ko_frontend_pronounce(
    handle: *const MeloKoFrontendHandle,
    text: *const c_char,
) -> *const c_char {
    if handle.is_null() {
        return std::ptr::null();
    }
    let Some(text) = (unsafe { cstr_to_string(text) }) else {
        return std::ptr::null();
    };
    let h = unsafe { &*handle };
    to_c_str(&h.frontend.g2p().engine().convert(&text))
}

/// Split `text` into synthesis sentences; returns a JSON array of strings.
///
/// @param min_bytes  Minimum sentence length in UTF-8 bytes (30 is typical).
#[no_mangle]
pub unsafe extern "C" fn melo_ko_split_sentences(text: *const c_char, min_bytes: usize) -> *const c_char {
    let Some(text) = (unsafe { cstr_to_string(text) }) else {
        return std::ptr::null();
    };
    match serde_json::to_string(&split_sentences(&text, min_bytes)) {
        Ok(json) => to_c_str(&json),
        Err(e) => {
            error!("melo_ko_split_sentences: {e}");
            std::ptr::null()
        }
    }
}

/// Free a string returned by any function above.
#[no_mangle]
pub unsafe extern "C" fn melo_ko_free_string(s: *const c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s as *mut c_char) });
    }
}

/// Destroy a frontend handle.
#[no_mangle]
pub unsafe extern "C" fn melo_ko_frontend_free(handle: *mut MeloKoFrontendHandle) {
    if !handle.is_null() {
        drop(unsafe { Box::from_raw(handle) });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
