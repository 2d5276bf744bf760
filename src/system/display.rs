// Display collaborator - the coordinator only tells it what happened, never waits on it

/// Events shown on the device display (or status LED). Fire-and-forget.
pub trait DisplayEvents {
    fn connecting(&mut self);
    fn erasing(&mut self);
    fn erased(&mut self);
    fn update_begin(&mut self);
    /// `fraction` is in `0.0..=1.0`
    fn update_progress(&mut self, fraction: f32);
    fn update_end(&mut self);
}

impl<D: DisplayEvents + ?Sized> DisplayEvents for &mut D {
    fn connecting(&mut self) {
        (**self).connecting()
    }

    fn erasing(&mut self) {
        (**self).erasing()
    }

    fn erased(&mut self) {
        (**self).erased()
    }

    fn update_begin(&mut self) {
        (**self).update_begin()
    }

    fn update_progress(&mut self, fraction: f32) {
        (**self).update_progress(fraction)
    }

    fn update_end(&mut self) {
        (**self).update_end()
    }
}

/// Headless boards: display events go to the log, progress in 10% steps
#[derive(Debug, Default)]
pub struct LogDisplay {
    last_decile: Option<u8>,
}

impl DisplayEvents for LogDisplay {
    fn connecting(&mut self) {
        log::info!("Display: connecting");
    }

    fn erasing(&mut self) {
        log::warn!("Display: erasing storage");
    }

    fn erased(&mut self) {
        log::warn!("Display: storage erased");
    }

    fn update_begin(&mut self) {
        self.last_decile = None;
        log::info!("Display: update begins");
    }

    fn update_progress(&mut self, fraction: f32) {
        let decile = (fraction.clamp(0.0, 1.0) * 10.0) as u8;
        if self.last_decile != Some(decile) {
            self.last_decile = Some(decile);
            log::info!("Display: update {}%", decile as u32 * 10);
        }
    }

    fn update_end(&mut self) {
        log::info!("Display: update finished");
    }
}
