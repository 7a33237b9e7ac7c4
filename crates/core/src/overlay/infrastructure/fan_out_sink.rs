use crate::overlay::domain::overlay::Overlay;
use crate::overlay::domain::overlay_sink::OverlaySink;

/// Forwards every call to each inner sink, in order.
#[derive(Default)]
pub struct FanOutSink {
    sinks: Vec<Box<dyn OverlaySink>>,
}

impl FanOutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Box<dyn OverlaySink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl OverlaySink for FanOutSink {
    fn present(&mut self, overlay: &Overlay) {
        for sink in &mut self.sinks {
            sink.present(overlay);
        }
    }

    fn set_label(&mut self, text: &str) {
        for sink in &mut self.sinks {
            sink.set_label(text);
        }
    }

    fn dispose(&mut self) {
        for sink in &mut self.sinks {
            sink.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Tally(Arc<Mutex<Vec<String>>>, &'static str);

    impl OverlaySink for Tally {
        fn present(&mut self, _overlay: &Overlay) {
            self.0.lock().unwrap().push(format!("{}:present", self.1));
        }
        fn set_label(&mut self, text: &str) {
            self.0.lock().unwrap().push(format!("{}:{text}", self.1));
        }
        fn dispose(&mut self) {
            self.0.lock().unwrap().push(format!("{}:dispose", self.1));
        }
    }

    #[test]
    fn test_forwards_to_every_sink_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut sink = FanOutSink::new()
            .with(Box::new(Tally(Arc::clone(&log), "a")))
            .with(Box::new(Tally(Arc::clone(&log), "b")));
        assert_eq!(sink.len(), 2);

        sink.set_label("Emotion: anger");
        sink.present(&Overlay::default());
        sink.dispose();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "a:Emotion: anger",
                "b:Emotion: anger",
                "a:present",
                "b:present",
                "a:dispose",
                "b:dispose",
            ]
        );
    }

    #[test]
    fn test_empty_fan_out_is_noop() {
        let mut sink = FanOutSink::new();
        assert!(sink.is_empty());
        sink.present(&Overlay::default());
        sink.dispose();
    }
}
