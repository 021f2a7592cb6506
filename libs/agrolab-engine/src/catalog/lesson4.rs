// Lesson 4: functions, then a class hierarchy with properties and ABCs

use futures_util::future::BoxFuture;

use super::ExerciseSpec;
use crate::args;
use crate::context::BoundContext;
use crate::error::CaseResult;
use crate::expect::{expect_close, expect_eq, expect_instance, expect_raises, expect_type, fail};
use crate::value::PyValue;
use std::time::Duration;

pub(super) fn exercises() -> Vec<ExerciseSpec> {
    vec![
        ExerciseSpec::new("oblicz_plon", "Funkcja oblicz_plon", 4)
            .function("oblicz_plon")
            .case("test_typowe_pole", plon_typowe_pole)
            .case("test_liczby_calkowite", plon_liczby_calkowite)
            .case("test_zerowa_powierzchnia", plon_zerowa_powierzchnia),
        ExerciseSpec::new("uprawy", "Hierarchia klas upraw", 4)
            .class("Uprawa")
            .class("Zboze")
            .class("Warzywo")
            .class("EkologicznaUprawa")
            .case("test_abstrakcyjnosc", uprawy_abstrakcyjnosc)
            .case("test_zboze_implementacja", uprawy_zboze_implementacja)
            .case("test_ujemny_plon", uprawy_ujemny_plon)
            .case("test_ekologiczna_dziedziczenie", uprawy_ekologiczna_dziedziczenie)
            .case("test_polimorfizm", uprawy_polimorfizm)
            .case("test_premia_ekologiczna", uprawy_premia_ekologiczna)
            // six cases, each building several instances
            .budget(Duration::from_secs(5)),
    ]
}

fn plon_typowe_pole(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        let plon = ctx.call("oblicz_plon", args![5.2, 8.3]).await?;
        expect_close(&plon, 5.2 * 8.3, 1e-6)
    })
}

fn plon_liczby_calkowite(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        let plon = ctx.call("oblicz_plon", args![10, 7]).await?;
        expect_eq(&plon, 70)
    })
}

fn plon_zerowa_powierzchnia(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        let plon = ctx.call("oblicz_plon", args![0, 8.0]).await?;
        expect_close(&plon, 0.0, 1e-9)
    })
}

fn uprawy_abstrakcyjnosc(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        expect_raises(ctx.call("Uprawa", args!["test", 1.0]).await, "TypeError")?;
        Ok(())
    })
}

fn uprawy_zboze_implementacja(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        let zboze = ctx.call("Zboze", args!["Pszenica", 5.0, "Boomer"]).await?;
        ctx.set_attr(&zboze, "plon", 8.5).await?;
        let plon = ctx.get_attr(&zboze, "plon").await?;
        expect_eq(&plon, 8.5)?;
        expect_instance(ctx, &zboze, "Uprawa").await
    })
}

fn uprawy_ujemny_plon(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        let zboze = ctx.call("Zboze", args!["Pszenica", 5.0, "Boomer"]).await?;
        let result = ctx.set_attr(&zboze, "plon", -1.0).await.map(|_| PyValue::None);
        expect_raises(result, "ValueError")?;
        Ok(())
    })
}

fn uprawy_ekologiczna_dziedziczenie(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        let eko = ctx
            .call("EkologicznaUprawa", args!["Pszenica ekologiczna", 3.0, "EkoGold", "EU Organic"])
            .await?;
        expect_instance(ctx, &eko, "Zboze").await?;
        expect_instance(ctx, &eko, "Uprawa").await?;
        let certyfikat = ctx.get_attr(&eko, "certyfikat").await?;
        expect_eq(&certyfikat, "EU Organic")
    })
}

fn uprawy_polimorfizm(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        let uprawy = [
            ctx.call("Zboze", args!["Pszenica", 5.0, "A"]).await?,
            ctx.call("Warzywo", args!["Marchew", 2.0, 90]).await?,
        ];
        for uprawa in &uprawy {
            let wymagania = ctx.call_method(uprawa, "wymagania_wodne", args![]).await?;
            expect_type(&wymagania, "str")?;
        }
        Ok(())
    })
}

fn uprawy_premia_ekologiczna(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        let zboze = ctx.call("Zboze", args!["Pszenica", 5.0, "A"]).await?;
        let eko = ctx.call("EkologicznaUprawa", args!["Pszenica eko", 5.0, "A", "Cert"]).await?;
        ctx.set_attr(&zboze, "plon", 8.0).await?;
        ctx.set_attr(&eko, "plon", 8.0).await?;

        let zwykly = ctx.call_method(&zboze, "oblicz_przychod", args![800]).await?;
        let ekologiczny = ctx.call_method(&eko, "oblicz_przychod", args![800]).await?;
        let (Some(zwykly), Some(ekologiczny)) = (zwykly.as_f64(), ekologiczny.as_f64()) else {
            return fail(format!(
                "expected oblicz_przychod to return numbers, got {} and {}",
                zwykly, ekologiczny
            ));
        };
        if zwykly <= 0.0 {
            return fail(format!("expected a positive revenue for Zboze, got {}", PyValue::Float(zwykly)));
        }
        if ekologiczny <= zwykly {
            return fail(format!(
                "expected organic revenue above {}, got {}",
                PyValue::Float(zwykly),
                PyValue::Float(ekologiczny)
            ));
        }
        Ok(())
    })
}
