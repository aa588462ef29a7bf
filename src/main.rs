mod audio;
mod render;
mod ui;
mod util;

use audio::controls::FilterControls;
use audio::{tap, tone};
use std::sync::Arc;
use ui::UiConfig;
use ui::settings::SettingsHandle;
use util::telemetry;

use tracing::{error, info};

fn main() {
    telemetry::init();
    info!("Ladderscope starting up");

    let settings = SettingsHandle::load_or_default();
    let (controls, tone_config) = {
        let manager = settings.borrow();
        let data = manager.settings();
        (data.controls(), data.tone_config())
    };
    let controls = Arc::new(FilterControls::new(controls));

    let (writer, reader) = tap::tap();
    let tone = match tone::spawn(tone_config, Arc::clone(&controls), writer) {
        Ok(handle) => Some(handle),
        Err(err) => {
            error!("[tone] {err:#}; the scope will stay empty");
            None
        }
    };

    if let Err(err) = ui::run(UiConfig::new(settings, controls, reader)) {
        error!("[ui] failed: {err}");
    }

    if let Some(tone) = tone {
        tone.stop();
    }
    info!("Ladderscope shut down");
}
