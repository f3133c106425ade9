//! WASM bindings for the ode_core solver.
//!
//! Every export takes plain JS values, decodes them with `serde-wasm-bindgen`,
//! and reports failures as JS strings.

mod analysis;
mod request;

use ode_core::equation_engine::{allowed_symbols as core_allowed_symbols, validate};
use request::{solve_bridge, BridgeRequest};
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

fn decode_request(request: JsValue) -> Result<BridgeRequest, JsValue> {
    from_value(request).map_err(|e| JsValue::from_str(&format!("Invalid request: {}", e)))
}

fn encode<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    to_value(value).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

fn to_js_error(err: anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{err:#}"))
}

/// Solves `dy/dx = f(x, y)` and returns the trajectory, its summary, and plot series.
#[wasm_bindgen]
pub fn solve(request: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();
    let request = decode_request(request)?;
    let trajectory = solve_bridge(&request, None).map_err(to_js_error)?;

    #[derive(Serialize)]
    struct SolveResponse<'a> {
        trajectory: &'a ode_core::recorder::Trajectory,
        plot_data: ode_core::recorder::PlotData,
        method_info: &'static ode_core::solvers::MethodInfo,
        calculations: Vec<String>,
    }

    let calculations = (0..trajectory.num_steps())
        .filter_map(|step| trajectory.calculation(step))
        .collect();
    encode(&SolveResponse {
        trajectory: &trajectory,
        plot_data: trajectory.plot_data(),
        method_info: trajectory.method_info(),
        calculations,
    })
}

#[wasm_bindgen]
pub fn validate_expression(expression: &str) -> bool {
    validate(expression)
}

#[wasm_bindgen]
pub fn allowed_symbols() -> Result<JsValue, JsValue> {
    encode(&core_allowed_symbols())
}

#[wasm_bindgen]
pub fn slope_field_around(request: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();
    let request = decode_request(request)?;
    let field = analysis::slope_field_for(&request).map_err(to_js_error)?;
    encode(&field)
}

/// Solves the request with methods `a` and `b` and returns `|y_b - y_a|` per grid point.
#[wasm_bindgen]
pub fn compare_methods(request: JsValue, a: &str, b: &str) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();
    let request = decode_request(request)?;
    let comparison = analysis::compare_for(&request, a, b).map_err(to_js_error)?;
    encode(&comparison)
}
