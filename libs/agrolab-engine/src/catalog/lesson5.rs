// Lesson 5: custom exceptions and input validation

use futures_util::future::BoxFuture;
use std::collections::BTreeMap;

use super::ExerciseSpec;
use crate::args;
use crate::context::BoundContext;
use crate::error::{CaseResult, RaisedError};
use crate::expect::{expect_raises, expect_true, fail};
use crate::value::PyValue;

const WYJATEK: &str = "BlednyFormatDanychError";

pub(super) fn exercises() -> Vec<ExerciseSpec> {
    vec![ExerciseSpec::new("bledne_dane", "Walidacja raportu z własnym wyjątkiem", 5)
        .class(WYJATEK)
        .function("waliduj_raport")
        .case("test_poprawny_raport", raport_poprawny)
        .case("test_nie_slownik", raport_nie_slownik)
        .case("test_brakujace_klucze", raport_brakujace_klucze)
        .case("test_wyjatek_dziedziczy", raport_wyjatek_dziedziczy)]
}

fn raport(klucze: &[(&str, PyValue)]) -> PyValue {
    let map: BTreeMap<String, PyValue> = klucze
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    PyValue::Dict(map)
}

fn poprawny() -> PyValue {
    raport(&[
        ("data", PyValue::from("2024-05-01")),
        ("tytul", PyValue::from("Plony maj")),
        ("dane", PyValue::from(vec![42.5, 18.0])),
    ])
}

/// The raised exception must carry the rejected data in `dane_problemowe`
async fn dane_problemowe(ctx: &mut BoundContext, raised: &RaisedError) -> CaseResult {
    let Some(wyjatek) = &raised.exception else {
        return fail(format!("expected {} to carry dane_problemowe", WYJATEK));
    };
    let dane = ctx.get_attr(wyjatek, "dane_problemowe").await?;
    if dane == PyValue::None {
        return fail("expected dane_problemowe to be set, got None");
    }
    Ok(())
}

fn raport_poprawny(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        let wynik = ctx.call("waliduj_raport", vec![poprawny()]).await?;
        expect_true(&wynik, "waliduj_raport(poprawny_raport)")
    })
}

fn raport_nie_slownik(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        let result = ctx.call("waliduj_raport", args![vec!["nie", "słownik"]]).await;
        let raised = expect_raises(result, WYJATEK)?;
        dane_problemowe(ctx, &raised).await
    })
}

fn raport_brakujace_klucze(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        let niepelny = raport(&[("data", PyValue::from("2024-05-01"))]);
        let result = ctx.call("waliduj_raport", vec![niepelny]).await;
        let raised = expect_raises(result, WYJATEK)?;
        dane_problemowe(ctx, &raised).await
    })
}

fn raport_wyjatek_dziedziczy(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        let result = ctx.call("waliduj_raport", args![17]).await;
        let raised = expect_raises(result, WYJATEK)?;
        if raised.is_instance_of("Exception") {
            Ok(())
        } else {
            fail(format!("expected {} to derive from Exception", WYJATEK))
        }
    })
}
