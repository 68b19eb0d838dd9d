//! Browser entry point for the chart SDK
//!
//! Wires [`ChartContext`] to the page's window through
//! [`chart_sdk_bridge::WindowTransport`] and exports the context and the
//! formatting helpers to JavaScript.

pub mod wire;

#[cfg(target_arch = "wasm32")]
mod convert;
#[cfg(target_arch = "wasm32")]
pub mod js_context;
#[cfg(target_arch = "wasm32")]
pub mod js_format;
#[cfg(target_arch = "wasm32")]
pub mod js_props;

pub use chart_sdk_context::{ChartContext, ChartContextProps, ContextOptions, ContextState};
pub use chart_sdk_formatting as formatting;
pub use chart_sdk_shared as shared;

#[cfg(target_arch = "wasm32")]
pub use browser::*;

#[cfg(target_arch = "wasm32")]
mod browser {
    use crate::convert::sdk_error_to_js;
    use crate::js_context::JsChartContext;
    use crate::js_props::props_from_js;
    use chart_sdk_bridge::WindowTransport;
    use chart_sdk_context::{ChartContext, ChartContextProps, ContextOptions};
    use chart_sdk_shared::{ChartSdkError, SdkResult};
    use std::rc::Rc;
    use std::sync::Once;
    use wasm_bindgen::prelude::*;

    static LOGGING: Once = Once::new();

    /// Install the panic hook and the console logger; later calls do nothing
    pub fn init_logging(level: log::Level) {
        LOGGING.call_once(|| {
            console_error_panic_hook::set_once();
            // Another logger may already be installed by the embedding page
            let _ = console_log::init_with_level(level);
        });
    }

    #[wasm_bindgen(start)]
    pub fn start() {
        init_logging(log::Level::Info);
        log::debug!("Chart SDK module loaded");
    }

    /// Create the page's chart context, talking to the host window
    pub fn create_chart_context(props: ChartContextProps) -> SdkResult<ChartContext> {
        create_chart_context_with_options(props, ContextOptions::default())
    }

    pub fn create_chart_context_with_options(
        props: ChartContextProps,
        options: ContextOptions,
    ) -> SdkResult<ChartContext> {
        let transport = WindowTransport::from_location().map_err(|err| ChartSdkError::Transport {
            message: err.to_string(),
        })?;
        ChartContext::with_options(props, Rc::new(transport), options)
    }

    /// `createChartContext(props)` for JavaScript charts
    #[wasm_bindgen(js_name = createChartContext)]
    pub fn create_chart_context_js(props: JsValue) -> Result<JsChartContext, JsValue> {
        let props = props_from_js(&props)?;
        let context = create_chart_context(props).map_err(sdk_error_to_js)?;
        Ok(JsChartContext::from(context))
    }

    /// Raise or lower the console log level
    #[wasm_bindgen(js_name = setLogLevel)]
    pub fn set_log_level(level: &str) {
        let filter = level.parse::<log::LevelFilter>().unwrap_or(log::LevelFilter::Info);
        log::set_max_level(filter);
    }
}
