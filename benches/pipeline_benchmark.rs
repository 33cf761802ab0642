use std::fs;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tempfile::TempDir;

use actionweb::action::{Action, ActionForm, ActionRegistry};
use actionweb::exception::ActionException;
use actionweb::kernel::ActionKernel;
use actionweb::model::{
    ActionConfig, ActionMapping, FormBeanConfig, FormPropertyConfig, ForwardConfig,
    ModuleConfigBuilder,
};
use actionweb::request::Request;
use actionweb::response::Response;

struct Echo;

impl Action for Echo {
    fn execute(
        &self,
        _: &ActionMapping,
        form: Option<&mut dyn ActionForm>,
        _: &mut Request,
        response: &mut Response,
    ) -> Result<Option<ForwardConfig>, ActionException> {
        let name = form.and_then(|f| f.property("name")).unwrap_or_default();
        response.set_body(name.as_bytes());
        Ok(None)
    }
}

fn kernel(www: &TempDir) -> ActionKernel {
    fs::write(www.path().join("index.html"), "home").unwrap();
    let mut registry = ActionRegistry::new();
    registry.register_action("app.Echo", || Arc::new(Echo) as Arc<dyn Action>);

    let mut builder = ModuleConfigBuilder::new("");
    let mut bean = FormBeanConfig::new("echoForm", "dyna");
    bean.set_dynamic(true);
    bean.add_property(FormPropertyConfig::new("name"));
    builder.add_form_bean_config(bean);
    let mut echo = ActionConfig::new("/echo");
    echo.set_action_type("app.Echo");
    echo.set_name("echoForm");
    builder.add_action_config(echo);
    let mut show = ActionConfig::new("/show");
    show.set_forward("/index.html");
    builder.add_action_config(show);
    let mut page = ActionConfig::new("/page/*");
    page.set_action_type("forward");
    page.set_parameter("/index.html");
    builder.add_action_config(page);

    ActionKernel::builder()
        .www_root(www.path().to_str().unwrap())
        .registry(registry)
        .module(Arc::new(builder.freeze()), None)
        .build()
        .unwrap()
}

fn run(kernel: &ActionKernel, raw: &[u8]) {
    let mut request = Request::try_from(raw, 0).unwrap();
    let mut response = Response::new();
    kernel.process(&mut request, &mut response);
    black_box(response);
}

fn action_with_form_benchmark(c: &mut Criterion) {
    let www = TempDir::new().unwrap();
    let kernel = kernel(&www);
    let raw = b"POST /echo.do HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\n\r\nname=ana";

    c.bench_function("pipeline_action_with_form", |b| {
        b.iter(|| run(&kernel, black_box(raw)));
    });
}

fn static_forward_benchmark(c: &mut Criterion) {
    let www = TempDir::new().unwrap();
    let kernel = kernel(&www);
    let raw = b"GET /show.do HTTP/1.1\r\nHost: localhost\r\n\r\n";

    c.bench_function("pipeline_static_forward", |b| {
        b.iter(|| run(&kernel, black_box(raw)));
    });
}

fn wildcard_forward_benchmark(c: &mut Criterion) {
    let www = TempDir::new().unwrap();
    let kernel = kernel(&www);
    let raw = b"GET /page/about.do HTTP/1.1\r\nHost: localhost\r\n\r\n";

    c.bench_function("pipeline_wildcard_forward", |b| {
        b.iter(|| run(&kernel, black_box(raw)));
    });
}

fn bad_request_benchmark(c: &mut Criterion) {
    let www = TempDir::new().unwrap();
    let kernel = kernel(&www);
    let raw = b"GET /missing.do HTTP/1.1\r\nHost: localhost\r\n\r\n";

    c.bench_function("pipeline_bad_request", |b| {
        b.iter(|| run(&kernel, black_box(raw)));
    });
}

criterion_group!(
    benches,
    action_with_form_benchmark,
    static_forward_benchmark,
    wildcard_forward_benchmark,
    bad_request_benchmark
);
criterion_main!(benches);
