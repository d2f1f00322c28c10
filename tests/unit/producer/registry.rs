use super::*;
use crate::frame::frame::Frame;
use crate::processor::backend::FrameProcessor;
use crate::producer::frame_producer::FrameProducer;

fn params(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

struct Named(String);

impl FrameProducer for Named {
    fn initialize(&mut self, _processor: &dyn FrameProcessor) -> PlayoutResult<()> {
        Ok(())
    }

    fn get_frame(&mut self) -> PlayoutResult<Option<Frame>> {
        Ok(None)
    }

    fn describe(&self) -> String {
        self.0.clone()
    }
}

#[test]
fn color_parameters_build_a_color_producer() {
    let registry = ProducerRegistry::with_defaults(FactoryContext::default());
    let p = registry.create(&params(&["#FF00FF00"])).unwrap();
    assert_eq!(p.describe(), "color[#FF00FF00]");
}

#[test]
fn unmatched_parameters_fall_back_to_empty() {
    let registry = ProducerRegistry::with_defaults(FactoryContext::default());
    assert_eq!(registry.create(&params(&["clip.mov"])).unwrap().describe(), "empty");
    assert_eq!(registry.create(&params(&[""])).unwrap().describe(), "empty");
    assert_eq!(registry.create(&[]).unwrap().describe(), "empty");
}

#[test]
fn malformed_color_is_not_downgraded_to_empty() {
    let registry = ProducerRegistry::with_defaults(FactoryContext::default());
    let err = registry.create(&params(&["#FF00FF"])).unwrap_err();
    assert!(matches!(err, PlayoutError::InvalidArgument(_)));
}

#[test]
fn create_required_reports_null_argument() {
    let registry = ProducerRegistry::with_defaults(FactoryContext::default());
    let err = registry.create_required(&params(&["clip.mov"])).unwrap_err();
    assert!(matches!(err, PlayoutError::NullArgument(_)));
}

#[test]
fn registered_factories_see_context_and_keep_order() {
    let ctx = FactoryContext {
        template_folder: PathBuf::from("templates"),
    };
    let mut registry = ProducerRegistry::with_defaults(ctx);
    registry.register(
        "template",
        Box::new(
            |params: &[String], ctx: &FactoryContext| -> PlayoutResult<Option<BoxedProducer>> {
                let Some(name) = params.first().and_then(|p| p.strip_suffix(".ct")) else {
                    return Ok(None);
                };
                let path = ctx.template_folder.join(name);
                Ok(Some(Box::new(Named(format!("cg[{}]", path.display())))))
            },
        ),
    );

    assert_eq!(registry.factory_names().collect::<Vec<_>>(), vec!["color", "template"]);
    let p = registry.create(&params(&["lower_third.ct"])).unwrap();
    assert!(p.describe().contains("lower_third"));
    assert_eq!(registry.context().template_folder, PathBuf::from("templates"));
    // Earlier factories still take precedence.
    let p = registry.create(&params(&["#00000000"])).unwrap();
    assert_eq!(p.describe(), "color[#00000000]");
}
