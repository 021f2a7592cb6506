// Lesson 1: variables, simple arithmetic and a first class

use futures_util::future::BoxFuture;

use super::ExerciseSpec;
use crate::args;
use crate::context::BoundContext;
use crate::error::{CaseError, CaseResult};
use crate::expect::{expect_close, expect_contains, expect_eq, expect_false, expect_true, fail};
use crate::value::PyValue;

const TOLERANCE: f64 = 1e-6;

pub(super) fn exercises() -> Vec<ExerciseSpec> {
    vec![
        ExerciseSpec::new("yield_calc", "Szacowany plon z pola", 1)
            .function("szacowany_plon")
            .case("basic", yield_basic),
        ExerciseSpec::new("pole_uprawne", "Klasa PoleUprawne", 1)
            .class("PoleUprawne")
            .case("test_szacowany_plon", pole_szacowany_plon)
            .case("test_czy_opłacalne", pole_czy_oplacalne)
            .case("test_reprezentacja", pole_reprezentacja),
        ExerciseSpec::new("analiza_pol", "Analiza wielu pól", 1)
            .class("PoleUprawne")
            .function("analiza_pol")
            .case("test_laczny_plon", analiza_laczny_plon)
            .case("test_najwyzsze_plon", analiza_najwyzsze_plon)
            .case("test_ranking", analiza_ranking),
    ]
}

fn yield_basic(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        let plon = ctx.call("szacowany_plon", args![5.0, 8.5]).await?;
        expect_close(&plon, 42.5, TOLERANCE)
    })
}

/// The fixture every PoleUprawne check starts from
async fn pole_testowe(ctx: &mut BoundContext) -> Result<PyValue, CaseError> {
    Ok(ctx
        .call("PoleUprawne", args!["Testowe", 5.0, "Gliniasta", 8.5])
        .await?)
}

fn pole_szacowany_plon(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        let pole = pole_testowe(ctx).await?;
        let plon = ctx.call_method(&pole, "szacowany_plon", args![]).await?;
        expect_close(&plon, 42.5, 0.005)
    })
}

fn pole_czy_oplacalne(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        let pole = pole_testowe(ctx).await?;
        ctx.set_attr(&pole, "powierzchnia", 10.0).await?;
        ctx.set_attr(&pole, "plon_standardowy", 8.0).await?;

        // revenue 10 * 8 * 800 = 64000 against thresholds 30000 and 75000
        let tanie = ctx.call_method(&pole, "czy_opłacalne", args![20000]).await?;
        expect_true(&tanie, "czy_opłacalne(20000)")?;
        let drogie = ctx.call_method(&pole, "czy_opłacalne", args![50000]).await?;
        expect_false(&drogie, "czy_opłacalne(50000)")
    })
}

fn pole_reprezentacja(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        let pole = pole_testowe(ctx).await?;
        let text = ctx.to_str(&pole).await?;
        expect_contains(&text, "Pole:")?;
        expect_contains(&text, "Testowe")
    })
}

async fn dwa_pola(ctx: &mut BoundContext) -> Result<PyValue, CaseError> {
    let a = ctx.call("PoleUprawne", args!["A", 5, "glina", 8]).await?;
    let b = ctx.call("PoleUprawne", args!["B", 3, "piasek", 6]).await?;
    Ok(ctx.call("analiza_pol", vec![PyValue::List(vec![a, b])]).await?)
}

fn analiza_laczny_plon(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        let wynik = dwa_pola(ctx).await?;
        match wynik.get("laczny_plon") {
            Some(laczny) => expect_eq(laczny, 5 * 8 + 3 * 6),
            None => fail(format!("expected a dict with key 'laczny_plon', got {}", wynik)),
        }
    })
}

fn analiza_najwyzsze_plon(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        let wynik = dwa_pola(ctx).await?;
        let Some(najlepsze) = wynik.get("najwyzsze_plon").cloned() else {
            return fail(format!("expected a dict with key 'najwyzsze_plon', got {}", wynik));
        };
        let nazwa = ctx.get_attr(&najlepsze, "nazwa").await?;
        expect_eq(&nazwa, "A")
    })
}

fn analiza_ranking(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        let wynik = dwa_pola(ctx).await?;
        let Some(ranking) = wynik.get("ranking").and_then(PyValue::as_list).map(<[PyValue]>::to_vec)
        else {
            return fail(format!("expected 'ranking' to be a list, got {}", wynik));
        };
        let mut nazwy = Vec::with_capacity(ranking.len());
        for pole in &ranking {
            nazwy.push(ctx.get_attr(pole, "nazwa").await?);
        }
        expect_eq(&PyValue::List(nazwy), vec!["A", "B"])
    })
}
